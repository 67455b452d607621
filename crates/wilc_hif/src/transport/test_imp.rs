use super::Transport;
use crate::{
    dispatcher::{Request, parse_request, write_response},
    wid::{ConfigObject, Wid, WidKind, WidValue},
};
use parking_lot::Mutex;
use std::{sync::Arc, vec::Vec};

error_set::error_set! {
    MockError = {
        /// Scripted failure.
        Injected,
        Malformed,
    };
}

/// One decoded request seen by the simulated firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub vif: u8,
    pub request: Request,
}

impl Recorded {
    /// Objects of a `Set` request, empty for a `Get`.
    pub fn objects(&self) -> &[ConfigObject] {
        match &self.request {
            Request::Set(x) => x,
            Request::Get(_) => &[],
        }
    }

    pub fn find(&self, id: Wid) -> Option<&WidValue> {
        self.objects()
            .iter()
            .find(|x| x.id == id)
            .map(|x| &x.value)
    }
}

#[derive(Debug, Default)]
pub struct FirmwareLog {
    pub requests: Vec<Recorded>,
    /// Answers to `Get` requests. Anything missing is answered with a zero value.
    pub values: Vec<ConfigObject>,
    /// Number of upcoming exchanges that fail at the transport.
    pub fail: usize,
    /// Status byte returned for `Set` requests.
    pub set_status: u8,
}

impl FirmwareLog {
    /// Requests that set `id`, in order.
    pub fn sets(&self, id: Wid) -> Vec<&WidValue> {
        self.requests
            .iter()
            .filter_map(|x| x.find(id))
            .collect()
    }
}

fn default_value(kind: WidKind) -> WidValue {
    match kind {
        WidKind::Bool => WidValue::Bool(false),
        WidKind::Char => WidValue::Char(0),
        WidKind::Short => WidValue::Short(0),
        WidKind::Int => WidValue::Int(0),
        WidKind::Str => WidValue::Str(Vec::new()),
        WidKind::Bin => WidValue::Bin(Vec::new()),
    }
}

/// Simulated firmware answering configuration frames in-process.
#[derive(Debug, Clone, Default)]
pub struct MockFirmware {
    pub log: Arc<Mutex<FirmwareLog>>,
}

impl MockFirmware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the value firmware returns for a `Get` of `object.id`.
    pub fn answer(&self, object: ConfigObject) {
        let mut log = self.log.lock();
        log.values.retain(|x| x.id != object.id);
        log.values.push(object);
    }

    pub fn fail_next(&self, n: usize) {
        self.log.lock().fail = n;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().requests.clone()
    }

    pub fn clear(&self) {
        self.log.lock().requests.clear();
    }
}

impl Transport for MockFirmware {
    type Error = MockError;

    async fn exchange(&mut self, request: &[u8], response: &mut [u8]) -> Result<usize, MockError> {
        let mut log = self.log.lock();
        if log.fail > 0 {
            log.fail -= 1;
            return Err(MockError::Injected);
        }
        let (header, decoded) = parse_request(request).map_err(|_| MockError::Malformed)?;
        let (status, objects) = match &decoded {
            Request::Set(_) => (log.set_status, Vec::new()),
            Request::Get(queries) => (
                0,
                queries
                    .iter()
                    .map(|&(id, kind)| {
                        log.values
                            .iter()
                            .find(|x| x.id == id && x.value.kind() == kind)
                            .cloned()
                            .unwrap_or_else(|| ConfigObject::new(id, default_value(kind)))
                    })
                    .collect(),
            ),
        };
        log.requests.push(Recorded {
            vif: header.vif,
            request: decoded,
        });
        write_response(header.seq, status, &objects, response).map_err(|_| MockError::Malformed)
    }
}
