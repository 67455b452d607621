use std::{env::VarError, fmt::Display, ops::RangeInclusive, println, str::FromStr};

/// Like [`option_env!`] but tries to parse the environment variable as `T`.
pub fn parse_option_env<T>(env: &'static str) -> Option<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    println!("cargo::rerun-if-env-changed={}", env);
    match std::env::var(env) {
        Ok(env_str) => match env_str.parse() {
            Ok(s) => Some(s),
            Err(e) => {
                println!("cargo::warning={:?} env var invalid: {e}", env);
                None
            }
        },
        Err(VarError::NotPresent) => None,
        Err(e) => {
            println!("cargo::warning={:?} env var invalid: {e}", env);
            None
        }
    }
}

/// Parse `env` as `T`, falling back to `default` when unset, invalid or outside of `range`.
pub fn parse_env_in<T>(env: &'static str, range: RangeInclusive<T>, default: T) -> T
where
    T: FromStr + PartialOrd + Display + Copy,
    <T as FromStr>::Err: std::fmt::Display,
{
    match parse_option_env::<T>(env) {
        Some(x) if range.contains(&x) => x,
        Some(x) => {
            println!(
                "cargo::warning={:?}={x} not in {}..={}, using {default}",
                env,
                range.start(),
                range.end()
            );
            default
        }
        None => default,
    }
}
