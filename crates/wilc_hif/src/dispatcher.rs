//! Request/response exchange of configuration objects with firmware.

use crate::{
    codec,
    consts::{DISPATCH_TIMEOUT, MAX_CFG_FRAME_SIZE},
    error::{CodecError, DispatchError},
    macros::wire_struct,
    transport::Transport,
    wid::{ConfigObject, Wid, WidKind, WidValue},
};
use alloc::vec::Vec;
use embassy_time::WithTimeout;
use scroll::{Pread, Pwrite};
use zerocopy::little_endian::U16;

const RESPONSE_OP: u8 = b'R';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Get = b'Q',
    Set = b'W',
}

impl TryFrom<u8> for Direction {
    type Error = DispatchError;

    fn try_from(op: u8) -> Result<Self, Self::Error> {
        match op {
            b'Q' => Ok(Self::Get),
            b'W' => Ok(Self::Set),
            _ => Err(DispatchError::MalformedResponse),
        }
    }
}

wire_struct! {
    /// Leads every request frame.
    pub struct RequestHeader {
        op: u8,
        pub seq: u8,
        /// Length of the whole frame including this header.
        len: U16,
        /// Firmware interface index, see [`crate::VifIdx::fw_index`].
        pub vif: u8,
    }
}

impl RequestHeader {
    pub fn direction(&self) -> Result<Direction, DispatchError> {
        Direction::try_from(self.op)
    }
    pub fn len(&self) -> usize {
        self.len.into()
    }
}

wire_struct! {
    /// Leads every response frame.
    pub struct ResponseHeader {
        op: u8,
        pub seq: u8,
        len: U16,
        /// `0` on success.
        pub status: u8,
    }
}

impl ResponseHeader {
    pub fn len(&self) -> usize {
        self.len.into()
    }
}

/// Body of a decoded request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Set(Vec<ConfigObject>),
    Get(Vec<(Wid, WidKind)>),
}

/// Decode a request frame, as seen by firmware.
pub fn parse_request(frame: &[u8]) -> Result<(RequestHeader, Request), DispatchError> {
    let header: RequestHeader = frame
        .pread(0)
        .map_err(|_| DispatchError::MalformedResponse)?;
    let body = frame
        .get(size_of::<RequestHeader>()..header.len())
        .ok_or(DispatchError::MalformedResponse)?;
    let request = match header.direction()? {
        Direction::Set => Request::Set(codec::decode(body)?),
        Direction::Get => Request::Get(codec::decode_query(body)?),
    };
    Ok((header, request))
}

/// Encode a response frame, as built by firmware.
pub fn write_response(
    seq: u8,
    status: u8,
    objects: &[ConfigObject],
    dst: &mut [u8],
) -> Result<usize, CodecError> {
    let len = size_of::<ResponseHeader>() + codec::encoded_len(objects);
    let header = ResponseHeader {
        op: RESPONSE_OP,
        seq,
        len: u16::try_from(len)
            .map_err(|_| CodecError::BufferTooSmall)?
            .into(),
        status,
    };
    let offset = &mut 0;
    dst.gwrite(header, offset)
        .map_err(|_| CodecError::BufferTooSmall)?;
    let body = dst.get_mut(*offset..).ok_or(CodecError::BufferTooSmall)?;
    Ok(*offset + codec::encode_into(objects, body)?)
}

/// Copy response values into the caller's objects. String and binary buffers bound the accepted length.
fn fill(objects: &mut [ConfigObject], mut values: Vec<ConfigObject>) -> Result<(), DispatchError> {
    for object in objects {
        let idx = values
            .iter()
            .position(|x| x.id == object.id && x.value.kind() == object.value.kind())
            .ok_or_else(|| {
                log::warn!("response missing object {}", object.id);
                DispatchError::MalformedResponse
            })?;
        let value = values.swap_remove(idx).value;
        match (&mut object.value, value) {
            (WidValue::Str(buf), WidValue::Str(new)) | (WidValue::Bin(buf), WidValue::Bin(new)) => {
                if new.len() > buf.len() {
                    log::warn!(
                        "response object {} too long: len={} max={}",
                        object.id,
                        new.len(),
                        buf.len()
                    );
                    return Err(DispatchError::MalformedResponse);
                }
                *buf = new;
            }
            (slot, new) => *slot = new,
        }
    }
    Ok(())
}

/// Sends batches of configuration objects to firmware over `T`.
pub struct Dispatcher<T> {
    transport: T,
    seq: u8,
    response: Vec<u8>,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            seq: 0,
            response: alloc::vec![0; MAX_CFG_FRAME_SIZE],
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// One request/response exchange. On [`Direction::Get`] the values of `objects` are replaced
    /// with firmware's, string and binary values must be pre-sized to the longest accepted response.
    pub async fn send(
        &mut self,
        vif: u8,
        direction: Direction,
        objects: &mut [ConfigObject],
    ) -> Result<(), DispatchError> {
        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;

        let body_len = match direction {
            Direction::Set => codec::encoded_len(objects),
            Direction::Get => codec::query_len(objects),
        };
        let len = size_of::<RequestHeader>() + body_len;
        if len > MAX_CFG_FRAME_SIZE {
            return Err(CodecError::MalformedLength {
                len,
                remaining: MAX_CFG_FRAME_SIZE,
            }
            .into());
        }
        let mut request = alloc::vec![0; len];
        let header = RequestHeader {
            op: direction as u8,
            seq,
            len: (len as u16).into(),
            vif,
        };
        let offset = &mut 0;
        request
            .gwrite(header, offset)
            .map_err(|_| CodecError::BufferTooSmall)?;
        match direction {
            Direction::Set => codec::encode_into(objects, &mut request[*offset..])?,
            Direction::Get => codec::encode_query_into(objects, &mut request[*offset..])?,
        };
        log::debug!(
            "cfg request: vif={vif} direction={direction:?} seq={seq} objects={}",
            objects.len()
        );

        let len = match self
            .transport
            .exchange(&request, &mut self.response)
            .with_timeout(DISPATCH_TIMEOUT)
            .await
        {
            Ok(Ok(len)) => len,
            Ok(Err(e)) => {
                log::error!("transport failed: seq={seq} {e:?}");
                return Err(DispatchError::TransportFailure);
            }
            Err(_) => {
                log::error!("no response: seq={seq}");
                return Err(DispatchError::Timeout);
            }
        };

        let response = self
            .response
            .get(..len)
            .ok_or(DispatchError::MalformedResponse)?;
        let header: ResponseHeader = response
            .pread(0)
            .map_err(|_| DispatchError::MalformedResponse)?;
        if header.op != RESPONSE_OP || header.seq != seq {
            log::warn!("unexpected response: op={} seq={}", header.op, header.seq);
            return Err(DispatchError::MalformedResponse);
        }
        // Shorter than declared.
        let body = response
            .get(size_of::<ResponseHeader>()..header.len())
            .ok_or(DispatchError::MalformedResponse)?;
        if header.status != 0 {
            return Err(DispatchError::Rejected {
                status: header.status,
            });
        }
        if direction == Direction::Get {
            fill(objects, codec::decode(body)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use embassy_futures::block_on;

    /// Answers every request with whatever `reply` builds from it.
    struct Scripted<F>(F);

    impl<F: FnMut(&RequestHeader, &mut [u8]) -> usize> Transport for Scripted<F> {
        type Error = ();

        async fn exchange(&mut self, request: &[u8], response: &mut [u8]) -> Result<usize, ()> {
            let (header, _) = parse_request(request).map_err(|_| ())?;
            Ok((self.0)(&header, response))
        }
    }

    fn reply(seq: u8, status: u8, objects: &[ConfigObject], dst: &mut [u8]) -> usize {
        write_response(seq, status, objects, dst).unwrap()
    }

    #[test]
    fn get_fills_values() {
        let mut dispatcher = Dispatcher::new(Scripted(|h: &RequestHeader, dst: &mut [u8]| {
            let objects = [
                ConfigObject::str(Wid::MAC_ADDR, vec![1, 2, 3, 4, 5, 6]),
                ConfigObject::char(Wid::RSSI, 0xc4),
            ];
            reply(h.seq, 0, &objects, dst)
        }));
        let mut objects = [
            ConfigObject::char(Wid::RSSI, 0),
            ConfigObject::str_query(Wid::MAC_ADDR, 6),
        ];
        block_on(dispatcher.send(1, Direction::Get, &mut objects)).unwrap();
        assert_eq!(objects[0].value, WidValue::Char(0xc4));
        assert_eq!(objects[1].value.as_bytes(), Some(&[1, 2, 3, 4, 5, 6][..]));
    }

    #[test]
    fn rejects_bad_responses() {
        let mut dispatcher = Dispatcher::new(Scripted(|h: &RequestHeader, dst: &mut [u8]| {
            reply(h.seq.wrapping_add(1), 0, &[], dst)
        }));
        let mut objects = [ConfigObject::char(Wid::DISCONNECT, 0)];
        assert!(matches!(
            block_on(dispatcher.send(1, Direction::Set, &mut objects)),
            Err(DispatchError::MalformedResponse)
        ));

        let mut dispatcher = Dispatcher::new(Scripted(|h: &RequestHeader, dst: &mut [u8]| {
            reply(h.seq, 3, &[], dst)
        }));
        assert!(matches!(
            block_on(dispatcher.send(1, Direction::Set, &mut objects)),
            Err(DispatchError::Rejected { status: 3 })
        ));

        // Declared length past the bytes actually returned.
        let mut dispatcher = Dispatcher::new(Scripted(|h: &RequestHeader, dst: &mut [u8]| {
            let objects = [ConfigObject::int(Wid::FAILED_COUNT, 54)];
            reply(h.seq, 0, &objects, dst) - 1
        }));
        let mut objects = [ConfigObject::int(Wid::FAILED_COUNT, 0)];
        assert!(matches!(
            block_on(dispatcher.send(1, Direction::Get, &mut objects)),
            Err(DispatchError::MalformedResponse)
        ));
    }

    #[test]
    fn get_missing_object_or_too_long() {
        let mut dispatcher = Dispatcher::new(Scripted(|h: &RequestHeader, dst: &mut [u8]| {
            reply(h.seq, 0, &[ConfigObject::str(Wid::MAC_ADDR, vec![0; 8])], dst)
        }));
        let mut objects = [ConfigObject::str_query(Wid::MAC_ADDR, 6)];
        assert!(matches!(
            block_on(dispatcher.send(1, Direction::Get, &mut objects)),
            Err(DispatchError::MalformedResponse)
        ));
        let mut objects = [ConfigObject::char(Wid::RSSI, 0)];
        assert!(matches!(
            block_on(dispatcher.send(1, Direction::Get, &mut objects)),
            Err(DispatchError::MalformedResponse)
        ));
    }
}
