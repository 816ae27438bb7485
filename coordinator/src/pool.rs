//! Candidate pool: connected peers eligible to take zone authority
//!
//! Candidates are kept in arrival order; the drain step always offers a
//! zone to the first idle entry. A candidate leaves the pool when its
//! connection drops or the moment an assignment to it succeeds — a
//! server that wants to host further zones registers again.

use crate::zone::AuthorityRef;
use log::debug;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub peer: AuthorityRef,
    pub addr: SocketAddr,
    /// True while an assignment handshake to this candidate is in flight.
    pub busy: bool,
}

#[derive(Debug, Default)]
pub struct CandidatePool {
    candidates: Vec<Candidate>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    /// Adds an idle candidate. Returns false if the peer is already pooled.
    pub fn add(&mut self, peer: AuthorityRef, addr: SocketAddr) -> bool {
        if self.contains(peer) {
            return false;
        }
        self.candidates.push(Candidate {
            peer,
            addr,
            busy: false,
        });
        debug!("Candidate pool gained {:?} ({} total)", peer, self.candidates.len());
        true
    }

    /// Removes a candidate outright, idle or busy. Returns false if absent.
    pub fn remove(&mut self, peer: AuthorityRef) -> bool {
        let before = self.candidates.len();
        self.candidates.retain(|c| c.peer != peer);
        self.candidates.len() != before
    }

    pub fn contains(&self, peer: AuthorityRef) -> bool {
        self.candidates.iter().any(|c| c.peer == peer)
    }

    pub fn has_idle(&self) -> bool {
        self.candidates.iter().any(|c| !c.busy)
    }

    /// Marks the first idle candidate busy and returns a copy of it.
    pub fn claim_first_idle(&mut self) -> Option<Candidate> {
        let candidate = self.candidates.iter_mut().find(|c| !c.busy)?;
        candidate.busy = true;
        Some(candidate.clone())
    }

    /// Returns a busy candidate to the idle state after a failed
    /// handshake. A no-op when the peer already left the pool.
    pub fn release(&mut self, peer: AuthorityRef) {
        if let Some(candidate) = self.candidates.iter_mut().find(|c| c.peer == peer) {
            candidate.busy = false;
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
