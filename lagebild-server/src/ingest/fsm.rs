use std::time::Duration;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Disconnected,
    Connecting,
    Subscribed,
    BackingOff,
    Stopping,
}

/// What just happened, as reported by the driver loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmInput {
    /// Initial kick, and the wake-up after a backoff wait.
    Start,
    Connected,
    ConnectFailed,
    SubscribeOk,
    SubscribeFailed,
    /// Peer closed the stream cleanly.
    StreamEnded,
    StreamError,
    /// Server reported a rate-limit condition.
    Throttled,
    Stop,
}

/// What the driver loop must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmAction {
    Connect,
    Subscribe,
    Read,
    Wait(Duration),
    Halt,
}

/// Reconnect state machine with exponential backoff.
///
/// The backoff ladder doubles from `floor` to `ceiling` and resets to the
/// floor on a successful subscription. A throttle condition waits the
/// fixed `throttle_wait` instead and leaves the ladder untouched.
#[derive(Debug)]
pub struct ConnectionFsm {
    state: IngestState,
    backoff: Duration,
    floor: Duration,
    ceiling: Duration,
    throttle_wait: Duration,
}

impl ConnectionFsm {
    pub fn new(floor: Duration, ceiling: Duration, throttle_wait: Duration) -> Self {
        ConnectionFsm {
            state: IngestState::Disconnected,
            backoff: floor,
            floor,
            ceiling,
            throttle_wait,
        }
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    fn back_off(&mut self) -> FsmAction {
        self.state = IngestState::BackingOff;
        let wait = self.backoff;
        self.backoff = std::cmp::min(self.backoff * 2, self.ceiling);
        FsmAction::Wait(wait)
    }

    /// Advance by one input and return the next action for the driver.
    pub fn next(&mut self, input: FsmInput) -> FsmAction {
        if input == FsmInput::Stop || self.state == IngestState::Stopping {
            self.state = IngestState::Stopping;
            return FsmAction::Halt;
        }
        match (self.state, input) {
            (IngestState::Disconnected | IngestState::BackingOff, FsmInput::Start) => {
                self.state = IngestState::Connecting;
                FsmAction::Connect
            }
            (IngestState::Connecting, FsmInput::Connected) => FsmAction::Subscribe,
            (IngestState::Connecting, FsmInput::SubscribeOk) => {
                self.state = IngestState::Subscribed;
                self.backoff = self.floor;
                FsmAction::Read
            }
            (IngestState::Subscribed, FsmInput::Throttled) => {
                self.state = IngestState::BackingOff;
                FsmAction::Wait(self.throttle_wait)
            }
            // Connect/subscribe failures and any end of stream all take
            // the backoff ladder.
            _ => self.back_off(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fsm() -> ConnectionFsm {
        ConnectionFsm::new(
            Duration::from_secs(2),
            Duration::from_secs(60),
            Duration::from_secs(120),
        )
    }

    #[test]
    fn test_happy_path() {
        let mut f = fsm();
        assert_eq!(f.next(FsmInput::Start), FsmAction::Connect);
        assert_eq!(f.state(), IngestState::Connecting);
        assert_eq!(f.next(FsmInput::Connected), FsmAction::Subscribe);
        assert_eq!(f.next(FsmInput::SubscribeOk), FsmAction::Read);
        assert_eq!(f.state(), IngestState::Subscribed);
    }

    #[test]
    fn test_backoff_doubles_to_ceiling() {
        let mut f = fsm();
        f.next(FsmInput::Start);
        assert_eq!(f.next(FsmInput::ConnectFailed), FsmAction::Wait(Duration::from_secs(2)));
        f.next(FsmInput::Start);
        assert_eq!(f.next(FsmInput::ConnectFailed), FsmAction::Wait(Duration::from_secs(4)));
        f.next(FsmInput::Start);
        assert_eq!(f.next(FsmInput::ConnectFailed), FsmAction::Wait(Duration::from_secs(8)));
        for _ in 0..10 {
            f.next(FsmInput::Start);
            f.next(FsmInput::ConnectFailed);
        }
        f.next(FsmInput::Start);
        assert_eq!(
            f.next(FsmInput::ConnectFailed),
            FsmAction::Wait(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_backoff_resets_after_subscribe() {
        let mut f = fsm();
        f.next(FsmInput::Start);
        f.next(FsmInput::ConnectFailed);
        f.next(FsmInput::Start);
        f.next(FsmInput::ConnectFailed);
        // reconnect succeeds
        f.next(FsmInput::Start);
        f.next(FsmInput::Connected);
        f.next(FsmInput::SubscribeOk);
        // next failure starts at the floor again
        assert_eq!(
            f.next(FsmInput::StreamError),
            FsmAction::Wait(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_throttle_uses_fixed_wait_and_keeps_ladder() {
        let mut f = fsm();
        f.next(FsmInput::Start);
        f.next(FsmInput::ConnectFailed); // ladder now at 4s
        f.next(FsmInput::Start);
        f.next(FsmInput::Connected);
        f.next(FsmInput::SubscribeOk); // ladder reset to 2s
        assert_eq!(
            f.next(FsmInput::Throttled),
            FsmAction::Wait(Duration::from_secs(120))
        );
        f.next(FsmInput::Start);
        assert_eq!(
            f.next(FsmInput::ConnectFailed),
            FsmAction::Wait(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_stop_halts_from_any_state() {
        let mut f = fsm();
        assert_eq!(f.next(FsmInput::Stop), FsmAction::Halt);
        assert_eq!(f.state(), IngestState::Stopping);
        // stays halted
        assert_eq!(f.next(FsmInput::Start), FsmAction::Halt);

        let mut f = fsm();
        f.next(FsmInput::Start);
        f.next(FsmInput::Connected);
        f.next(FsmInput::SubscribeOk);
        assert_eq!(f.next(FsmInput::Stop), FsmAction::Halt);
    }

    #[test]
    fn test_stream_end_reconnects() {
        let mut f = fsm();
        f.next(FsmInput::Start);
        f.next(FsmInput::Connected);
        f.next(FsmInput::SubscribeOk);
        assert_eq!(
            f.next(FsmInput::StreamEnded),
            FsmAction::Wait(Duration::from_secs(2))
        );
        assert_eq!(f.state(), IngestState::BackingOff);
        assert_eq!(f.next(FsmInput::Start), FsmAction::Connect);
    }
}
