// Handshake state machine
// Connection progress is driven by named events rather than ad hoc checks of
// which session fields happen to be present, so the transition table is
// testable on its own.

use tokio::sync::watch;
use tracing::debug;

use crate::signaling::client::SignalingEvent;
use crate::signaling::session::Role;

/// Externally visible phase of one handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakePhase {
    Idle,
    CreatingSession,
    JoiningSession,
    /// Session exists, the counterpart has not shown up yet.
    WaitingForPeer,
    /// Both parties present, offer/answer/candidates still flowing.
    ExchangingSignaling,
    /// Answer present and the peer channel reported ready.
    Connected,
    /// Terminal. A fresh handshake must be started from scratch.
    Failed(String),
}

impl HandshakePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakePhase::Connected | HandshakePhase::Failed(_))
    }
}

/// Inputs to the machine.
///
/// `AnswerReceived` means "the answer is now present in the session": a host
/// observes it through polling, a client fires it when it sends its own.
#[derive(Debug, Clone)]
pub enum HandshakeEvent {
    CreateRequested,
    JoinRequested,
    SessionCreated,
    SessionJoined { has_offer: bool },
    PeerAppeared,
    OfferReceived,
    AnswerReceived,
    PeerChannelReady,
    Failed { message: String },
}

/// The transition table. "Connected" needs two independent facts (answer
/// present, channel ready) which may arrive in either order, so they are
/// tracked as flags rather than phases.
#[derive(Debug)]
pub struct HandshakeState {
    phase: HandshakePhase,
    answer_seen: bool,
    channel_ready: bool,
}

impl HandshakeState {
    pub fn new() -> Self {
        Self {
            phase: HandshakePhase::Idle,
            answer_seen: false,
            channel_ready: false,
        }
    }

    pub fn phase(&self) -> &HandshakePhase {
        &self.phase
    }

    /// Apply an event; returns true if the phase changed.
    pub fn apply(&mut self, event: HandshakeEvent) -> bool {
        use HandshakeEvent as E;
        use HandshakePhase as P;

        let next = match (&self.phase, &event) {
            (_, E::Failed { message }) if !self.phase.is_terminal() => {
                Some(P::Failed(message.clone()))
            }

            (P::Idle, E::CreateRequested) => Some(P::CreatingSession),
            (P::Idle, E::JoinRequested) => Some(P::JoiningSession),

            (P::CreatingSession, E::SessionCreated) => Some(P::WaitingForPeer),

            (P::JoiningSession, E::SessionJoined { has_offer: true }) => {
                Some(P::ExchangingSignaling)
            }
            (P::JoiningSession, E::SessionJoined { has_offer: false }) => {
                Some(P::WaitingForPeer)
            }

            (P::WaitingForPeer, E::PeerAppeared) => Some(P::ExchangingSignaling),
            (P::WaitingForPeer, E::OfferReceived) => Some(P::ExchangingSignaling),
            // The answer implies the peer exists; skip ahead
            (P::WaitingForPeer, E::AnswerReceived) => {
                self.answer_seen = true;
                Some(self.settled_phase())
            }

            (P::ExchangingSignaling, E::AnswerReceived) => {
                self.answer_seen = true;
                Some(self.settled_phase())
            }
            (P::WaitingForPeer | P::ExchangingSignaling, E::PeerChannelReady) => {
                self.channel_ready = true;
                Some(self.settled_phase())
            }

            _ => None,
        };

        match next {
            Some(phase) if phase != self.phase => {
                debug!("handshake {:?} -> {:?} on {:?}", self.phase, phase, event);
                self.phase = phase;
                true
            }
            Some(_) => false,
            None => {
                debug!("handshake ignoring {:?} in {:?}", event, self.phase);
                false
            }
        }
    }

    /// Where an active handshake belongs given the connected-flags.
    fn settled_phase(&self) -> HandshakePhase {
        if self.answer_seen && self.channel_ready {
            HandshakePhase::Connected
        } else {
            HandshakePhase::ExchangingSignaling
        }
    }
}

impl Default for HandshakeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Couples the machine to a signaling event stream and publishes phase
/// changes on a watch channel for the application shell.
pub struct SignalingController {
    machine: HandshakeState,
    phase_tx: watch::Sender<HandshakePhase>,
}

impl SignalingController {
    pub fn new() -> (Self, watch::Receiver<HandshakePhase>) {
        let (phase_tx, phase_rx) = watch::channel(HandshakePhase::Idle);
        (
            Self {
                machine: HandshakeState::new(),
                phase_tx,
            },
            phase_rx,
        )
    }

    pub fn phase(&self) -> HandshakePhase {
        self.machine.phase().clone()
    }

    /// Feed one event through the machine; returns the new phase if changed.
    pub fn apply(&mut self, event: HandshakeEvent) -> Option<HandshakePhase> {
        if self.machine.apply(event) {
            let phase = self.machine.phase().clone();
            let _ = self.phase_tx.send(phase.clone());
            Some(phase)
        } else {
            None
        }
    }

    /// Translate a signaling client event into machine events for `role`.
    pub fn handle_signaling_event(
        &mut self,
        event: &SignalingEvent,
        role: Role,
    ) -> Option<HandshakePhase> {
        let mut changed = None;
        match event {
            SignalingEvent::Update(update) => {
                match role {
                    Role::Host => {
                        if update.peer_id.is_some() {
                            changed = self.apply(HandshakeEvent::PeerAppeared).or(changed);
                        }
                        if update.answer.is_some() {
                            changed = self.apply(HandshakeEvent::AnswerReceived).or(changed);
                        }
                    }
                    Role::Client => {
                        if update.offer.is_some() {
                            changed = self.apply(HandshakeEvent::OfferReceived).or(changed);
                        }
                    }
                }
            }
            SignalingEvent::Error(err) => {
                changed = self.apply(HandshakeEvent::Failed {
                    message: err.to_string(),
                });
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_at(events: &[HandshakeEvent]) -> HandshakeState {
        let mut m = HandshakeState::new();
        for e in events {
            m.apply(e.clone());
        }
        m
    }

    #[test]
    fn test_host_happy_path() {
        use HandshakeEvent as E;
        let mut m = HandshakeState::new();

        assert!(m.apply(E::CreateRequested));
        assert_eq!(*m.phase(), HandshakePhase::CreatingSession);
        assert!(m.apply(E::SessionCreated));
        assert_eq!(*m.phase(), HandshakePhase::WaitingForPeer);
        assert!(m.apply(E::PeerAppeared));
        assert_eq!(*m.phase(), HandshakePhase::ExchangingSignaling);
        assert!(m.apply(E::AnswerReceived));
        assert_eq!(*m.phase(), HandshakePhase::ExchangingSignaling);
        assert!(m.apply(E::PeerChannelReady));
        assert_eq!(*m.phase(), HandshakePhase::Connected);
    }

    #[test]
    fn test_client_join_with_offer_skips_waiting() {
        use HandshakeEvent as E;
        let m = machine_at(&[E::JoinRequested, E::SessionJoined { has_offer: true }]);
        assert_eq!(*m.phase(), HandshakePhase::ExchangingSignaling);
    }

    #[test]
    fn test_client_join_without_offer_waits() {
        use HandshakeEvent as E;
        let mut m = machine_at(&[E::JoinRequested, E::SessionJoined { has_offer: false }]);
        assert_eq!(*m.phase(), HandshakePhase::WaitingForPeer);
        m.apply(E::OfferReceived);
        assert_eq!(*m.phase(), HandshakePhase::ExchangingSignaling);
    }

    #[test]
    fn test_connected_requires_both_facts_in_either_order() {
        use HandshakeEvent as E;
        let base = [E::CreateRequested, E::SessionCreated, E::PeerAppeared];

        // answer first, channel second
        let mut m = machine_at(&base);
        m.apply(E::AnswerReceived);
        assert_ne!(*m.phase(), HandshakePhase::Connected);
        m.apply(E::PeerChannelReady);
        assert_eq!(*m.phase(), HandshakePhase::Connected);

        // channel first, answer second
        let mut m = machine_at(&base);
        m.apply(E::PeerChannelReady);
        assert_ne!(*m.phase(), HandshakePhase::Connected);
        m.apply(E::AnswerReceived);
        assert_eq!(*m.phase(), HandshakePhase::Connected);
    }

    #[test]
    fn test_answer_while_waiting_implies_peer() {
        use HandshakeEvent as E;
        let m = machine_at(&[E::CreateRequested, E::SessionCreated, E::AnswerReceived]);
        assert_eq!(*m.phase(), HandshakePhase::ExchangingSignaling);
    }

    #[test]
    fn test_failure_is_terminal_from_any_active_phase() {
        use HandshakeEvent as E;
        let fail = E::Failed {
            message: "session expired".into(),
        };

        for setup in [
            vec![],
            vec![E::CreateRequested],
            vec![E::CreateRequested, E::SessionCreated],
            vec![E::CreateRequested, E::SessionCreated, E::PeerAppeared],
        ] {
            let mut m = machine_at(&setup);
            assert!(m.apply(fail.clone()));
            assert_eq!(
                *m.phase(),
                HandshakePhase::Failed("session expired".into())
            );
            // No way out of failed
            assert!(!m.apply(E::PeerChannelReady));
            assert!(!m.apply(E::CreateRequested));
        }
    }

    #[test]
    fn test_connected_ignores_late_failure() {
        use HandshakeEvent as E;
        let mut m = machine_at(&[
            E::CreateRequested,
            E::SessionCreated,
            E::PeerAppeared,
            E::AnswerReceived,
            E::PeerChannelReady,
        ]);
        assert!(!m.apply(E::Failed {
            message: "late".into()
        }));
        assert_eq!(*m.phase(), HandshakePhase::Connected);
    }

    #[test]
    fn test_repeated_events_are_idempotent() {
        use HandshakeEvent as E;
        let mut m = machine_at(&[E::CreateRequested, E::SessionCreated, E::PeerAppeared]);
        // Poll updates keep re-reporting the peer; nothing changes
        assert!(!m.apply(E::PeerAppeared));
        assert_eq!(*m.phase(), HandshakePhase::ExchangingSignaling);
    }

    #[test]
    fn test_controller_publishes_phase_changes() {
        let (mut controller, phase_rx) = SignalingController::new();
        controller.apply(HandshakeEvent::CreateRequested);
        controller.apply(HandshakeEvent::SessionCreated);
        assert_eq!(*phase_rx.borrow(), HandshakePhase::WaitingForPeer);
        assert_eq!(controller.phase(), HandshakePhase::WaitingForPeer);
    }
}
