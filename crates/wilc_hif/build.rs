use const_gen::{const_declaration, CompileConst};
use std::{env, fs, path::Path};

fn main() {
    println!("cargo::rerun-if-changed=build.rs");

    let out_dir = env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("const_gen.rs");

    let const_declarations = [
        const_declaration!(
            /// Time firmware gets to finish a scan before it is aborted.
            pub SCAN_TIMEOUT_MS = common::build::parse_env_in::<u64>("HIF_SCAN_TIMEOUT_MS", 1..=60_000, 4000)
        ),
        const_declaration!(
            /// Time firmware gets to report the association result.
            pub CONNECT_TIMEOUT_MS = common::build::parse_env_in::<u64>("HIF_CONNECT_TIMEOUT_MS", 1..=60_000, 9500)
        ),
        const_declaration!(
            /// Period of the link statistics poll.
            pub STATS_POLL_MS = common::build::parse_env_in::<u64>("HIF_STATS_POLL_MS", 100..=600_000, 5000)
        ),
        const_declaration!(
            /// Upper bound on one configuration exchange with firmware.
            pub DISPATCH_TIMEOUT_MS = common::build::parse_env_in::<u64>("HIF_DISPATCH_TIMEOUT_MS", 1..=60_000, 1000)
        ),
        const_declaration!(
            /// Depth of the per-device work queue.
            pub WORK_QUEUE_DEPTH = common::build::parse_env_in::<usize>("HIF_QUEUE_DEPTH", 1..=256, 16)
        ),
    ]
    .join("\n");

    fs::write(dest_path, const_declarations).unwrap();
}
