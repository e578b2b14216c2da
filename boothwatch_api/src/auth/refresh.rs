use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

use tokio::sync::oneshot;

use crate::{ApiError, ApiResult};

type RefreshOutcome = Result<String, String>;

/// Serializes token refreshes for one client.
///
/// The first caller to enter while idle becomes the leader and owns the
/// refresh; everyone entering before the leader settles is queued and
/// released in join order with the leader's outcome. The lock is never held
/// across an await.
#[derive(Default)]
pub(crate) struct RefreshGate {
    state: Mutex<GateState>,
}

#[derive(Default)]
struct GateState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

pub(crate) enum RefreshTurn<'a> {
    Leader(RefreshLease<'a>),
    Follower(RefreshWaiter),
}

impl RefreshGate {
    pub(crate) fn enter(&self) -> RefreshTurn<'_> {
        let mut state = self.lock();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            log::debug!(
                "token refresh already in flight; queued request ({} waiting)",
                state.waiters.len()
            );
            return RefreshTurn::Follower(RefreshWaiter { rx });
        }

        state.in_flight = true;
        RefreshTurn::Leader(RefreshLease {
            gate: self,
            settled: false,
        })
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        self.lock().in_flight
    }

    pub(crate) fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    fn release(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        log::debug!(
            "token refresh settled ({}); releasing {} queued request(s)",
            if outcome.is_ok() { "ok" } else { "failed" },
            waiters.len()
        );
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Held by the leader for the duration of one refresh. Dropping it without
/// settling (for example when the leader's future is cancelled) fails every
/// queued waiter and reopens the gate.
pub(crate) struct RefreshLease<'a> {
    gate: &'a RefreshGate,
    settled: bool,
}

impl RefreshLease<'_> {
    pub(crate) fn succeed(mut self, access_token: &str) {
        self.settled = true;
        self.gate.release(Ok(access_token.to_owned()));
    }

    pub(crate) fn fail(mut self, reason: &str) {
        self.settled = true;
        self.gate.release(Err(reason.to_owned()));
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.gate
                .release(Err("token refresh was abandoned".to_owned()));
        }
    }
}

pub(crate) struct RefreshWaiter {
    rx: oneshot::Receiver<RefreshOutcome>,
}

impl RefreshWaiter {
    pub(crate) async fn wait(self) -> ApiResult<String> {
        match self.rx.await {
            Ok(Ok(access_token)) => Ok(access_token),
            Ok(Err(reason)) => Err(ApiError::RefreshFailed { reason }),
            Err(_) => Err(ApiError::RefreshFailed {
                reason: "token refresh was abandoned".to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RefreshGate, RefreshTurn, RefreshWaiter};
    use crate::ApiError;

    fn follower(gate: &RefreshGate) -> RefreshWaiter {
        match gate.enter() {
            RefreshTurn::Follower(waiter) => waiter,
            RefreshTurn::Leader(_) => panic!("expected to queue behind the leader"),
        }
    }

    #[tokio::test]
    async fn first_entrant_leads_and_others_queue() {
        let gate = RefreshGate::default();
        let RefreshTurn::Leader(lease) = gate.enter() else {
            panic!("idle gate should hand out leadership");
        };
        let first = follower(&gate);
        let second = follower(&gate);

        assert!(gate.is_refreshing());
        assert_eq!(gate.waiting(), 2);

        lease.succeed("fresh");

        assert!(!gate.is_refreshing());
        assert_eq!(gate.waiting(), 0);
        assert_eq!(first.wait().await.expect("first"), "fresh");
        assert_eq!(second.wait().await.expect("second"), "fresh");
    }

    #[tokio::test]
    async fn failure_is_delivered_to_every_waiter() {
        let gate = RefreshGate::default();
        let RefreshTurn::Leader(lease) = gate.enter() else {
            panic!("idle gate should hand out leadership");
        };
        let waiters = vec![follower(&gate), follower(&gate), follower(&gate)];

        lease.fail("refresh token revoked");

        for waiter in waiters {
            let err = waiter.wait().await.expect_err("refresh failed");
            assert!(
                matches!(err, ApiError::RefreshFailed { reason } if reason == "refresh token revoked")
            );
        }
    }

    #[tokio::test]
    async fn dropped_lease_fails_waiters_and_reopens_gate() {
        let gate = RefreshGate::default();
        let waiter = {
            let RefreshTurn::Leader(_lease) = gate.enter() else {
                panic!("idle gate should hand out leadership");
            };
            follower(&gate)
        };

        assert!(!gate.is_refreshing());
        assert!(matches!(
            waiter.wait().await,
            Err(ApiError::RefreshFailed { .. })
        ));
        assert!(matches!(gate.enter(), RefreshTurn::Leader(_)));
    }

    #[tokio::test]
    async fn gate_is_reusable_after_settling() {
        let gate = RefreshGate::default();
        for round in 0..3 {
            let RefreshTurn::Leader(lease) = gate.enter() else {
                panic!("round {round}: gate should be idle");
            };
            let waiter = follower(&gate);
            lease.succeed(&format!("token-{round}"));
            assert_eq!(waiter.wait().await.expect("token"), format!("token-{round}"));
        }
    }
}
