//! Pull cursors over received OpenFlow bytes.

use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::{OfpHeader, OfpVersion};
use crate::ofp_raw::OfpRaw;

/// Read-only view of unconsumed message bytes. Pulling advances the view.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OfpBuf<'a> {
    data: &'a [u8],
}

impl<'a> OfpBuf<'a> {
    pub fn new(data: &'a [u8]) -> OfpBuf<'a> {
        OfpBuf { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Return the unconsumed bytes without consuming them.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Consume and return the next `n` bytes, or `None` if fewer remain.
    pub fn try_pull(&mut self, n: usize) -> Option<&'a [u8]> {
        if n > self.data.len() {
            return None;
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Some(head)
    }

    /// Like `try_pull`, but a short buffer is a `BadLen` error.
    pub fn pull(&mut self, n: usize) -> Result<&'a [u8]> {
        self.try_pull(n).ok_or(OfpError::BadLen)
    }
}

#[derive(Copy, Clone, Debug)]
struct Recognized {
    raw: OfpRaw,
    header: OfpHeader,
    version: OfpVersion,
}

/// Cursor over one received message whose body holds several packed records.
///
/// The message header is recognized on first use and cached; later calls reuse it, so
/// the body is consumed record by record across repeated decode calls.
#[derive(Debug)]
pub struct OfpMsgCursor<'a> {
    msg: &'a [u8],
    recognized: Option<Recognized>,
    body: OfpBuf<'a>,
}

impl<'a> OfpMsgCursor<'a> {
    pub fn new(msg: &'a [u8]) -> OfpMsgCursor<'a> {
        OfpMsgCursor {
            msg,
            recognized: None,
            body: OfpBuf::new(&[]),
        }
    }

    /// Recognize the message header if that has not happened yet, and return its raw
    /// type and version.
    pub fn recognize(&mut self) -> Result<(OfpRaw, OfpVersion)> {
        if let Some(r) = self.recognized {
            return Ok((r.raw, r.version));
        }
        let (raw, header) = OfpRaw::decode(self.msg)?;
        let version = OfpVersion::of_wire(header.version())?;
        self.body = OfpBuf::new(&self.msg[raw.header_size(version)..header.length()]);
        self.recognized = Some(Recognized {
            raw,
            header,
            version,
        });
        Ok((raw, version))
    }

    /// Return the cached header, if the message has been recognized.
    pub fn header(&self) -> Option<OfpHeader> {
        self.recognized.map(|r| r.header)
    }

    /// Return the unconsumed body. Empty before recognition.
    pub fn body(&mut self) -> &mut OfpBuf<'a> {
        &mut self.body
    }

    /// Number of message bytes consumed so far, header included.
    pub fn consumed(&self) -> usize {
        match self.recognized {
            Some(r) => r.header.length() - self.body.len(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_and_try_pull() {
        let bytes = [1, 2, 3, 4, 5];
        let mut b = OfpBuf::new(&bytes);
        assert_eq!(b.pull(2).unwrap(), &[1, 2]);
        assert_eq!(b.try_pull(4), None);
        assert_eq!(b.len(), 3);
        assert_eq!(b.pull(4), Err(OfpError::BadLen));
        assert_eq!(b.pull(3).unwrap(), &[3, 4, 5]);
        assert!(b.is_empty());
    }

    #[test]
    fn cursor_recognizes_once() {
        let mut msg = OfpRaw::NxtFlowMonitorCancel.alloc(OfpVersion::Of10, 9).unwrap();
        msg.extend_from_slice(&[0, 0, 0, 42]);
        OfpHeader::update_length(&mut msg);
        msg.extend_from_slice(&[0xaa; 4]);

        let mut cursor = OfpMsgCursor::new(&msg);
        assert!(cursor.header().is_none());
        assert_eq!(cursor.recognize().unwrap(),
                   (OfpRaw::NxtFlowMonitorCancel, OfpVersion::Of10));
        assert_eq!(cursor.body().data(), &[0, 0, 0, 42]);
        assert_eq!(cursor.consumed(), 16);
        cursor.body().pull(4).unwrap();
        assert_eq!(cursor.recognize().unwrap().0, OfpRaw::NxtFlowMonitorCancel);
        assert!(cursor.body().is_empty());
        assert_eq!(cursor.consumed(), 20);
        assert_eq!(cursor.header().unwrap().xid(), 9);
    }
}
