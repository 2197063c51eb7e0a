//! Lane rotation — the turn token serializing ordered sections.
//!
//! A fixed set of lanes shares one token. A lane waits for the token to name
//! it, runs its ordered section, then passes the token to the next lane in
//! rotation. This is a cooperative hand-off, not a mutex: lanes proceed in
//! strict rotation order, and a lane with nothing to do must still take and
//! pass its turn so the rotation never stalls.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::EngineError;

pub struct Rotation {
    lanes: usize,
    token: Arc<watch::Sender<usize>>,
}

impl Rotation {
    /// Lane 0 holds the token initially.
    pub fn new(lanes: usize) -> Self {
        assert!(lanes > 0);
        let (token, _) = watch::channel(0usize);
        Self {
            lanes,
            token: Arc::new(token),
        }
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Handle for one lane. Create all handles before any lane runs.
    pub fn handle(&self, lane: usize) -> TurnHandle {
        assert!(lane < self.lanes);
        TurnHandle {
            lane,
            lanes: self.lanes,
            rx: self.token.subscribe(),
            token: self.token.clone(),
        }
    }
}

pub struct TurnHandle {
    lane: usize,
    lanes: usize,
    rx: watch::Receiver<usize>,
    token: Arc<watch::Sender<usize>>,
}

impl TurnHandle {
    pub fn lane(&self) -> usize {
        self.lane
    }

    /// Wait for this lane's turn.
    pub async fn take(&mut self) -> Result<(), EngineError> {
        self.rx
            .wait_for(|turn| *turn == self.lane)
            .await
            .map_err(|_| EngineError::Shutdown)?;
        Ok(())
    }

    /// Hand the token to the next lane in rotation.
    pub fn pass(&self) {
        self.token.send_replace((self.lane + 1) % self.lanes);
    }
}
