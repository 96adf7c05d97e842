//! The reader surface consumed by trace replay.
//!
//! Trace formats live elsewhere; replay only needs sequential access.

use crate::error::NativeError;
use crate::request::Request;

/// Sequential source of requests.
pub trait Reader {
    /// Rewinds to the first request.
    fn reset(&mut self) -> Result<(), NativeError>;

    /// Next request, or `None` at the end of the trace.
    fn next_req(&mut self) -> Result<Option<Request>, NativeError>;

    /// Skips `n` requests. Stops quietly at the end of the trace.
    fn skip_n_req(&mut self, n: u64) -> Result<(), NativeError> {
        for _ in 0..n {
            if self.next_req()?.is_none() {
                break;
            }
        }
        Ok(())
    }
}

/// Reader over requests held in memory.
#[derive(Clone, Debug, Default)]
pub struct VecReader {
    reqs: Vec<Request>,
    pos: usize,
}

impl VecReader {
    pub fn new(reqs: Vec<Request>) -> Self {
        VecReader { reqs, pos: 0 }
    }

    /// Unit-size requests for the given ids, one per clock tick.
    pub fn from_ids(ids: impl IntoIterator<Item = u64>) -> Self {
        let reqs = ids
            .into_iter()
            .enumerate()
            .map(|(t, id)| Request::new(id, 1).at(t as u64))
            .collect();
        VecReader::new(reqs)
    }

    pub fn len(&self) -> usize {
        self.reqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reqs.is_empty()
    }
}

impl Reader for VecReader {
    fn reset(&mut self) -> Result<(), NativeError> {
        self.pos = 0;
        Ok(())
    }

    fn next_req(&mut self) -> Result<Option<Request>, NativeError> {
        let req = self.reqs.get(self.pos).cloned();
        if req.is_some() {
            self.pos += 1;
        }
        Ok(req)
    }

    fn skip_n_req(&mut self, n: u64) -> Result<(), NativeError> {
        let n = usize::try_from(n).unwrap_or(usize::MAX);
        self.pos = self.pos.saturating_add(n).min(self.reqs.len());
        Ok(())
    }
}
