// Host-side lobby authority
// All lobby mutation funnels through here on the host; clients only ever
// receive the resulting snapshots. Mutation failures are business outcomes
// returned as typed results.

use std::sync::Arc;

use tracing::info;

use crate::error::LobbyError;
use crate::ids::{generate_game_code, now_ms};
use crate::lobby::types::{
    Deck, DeckBinding, GameLobby, LobbySettings, LobbyStatus, Player, PlayerStatus,
};
use crate::validate::DeckValidator;

/// Result of binding a deck. Binding succeeds even for invalid decks; the
/// validity flag only gates game start.
#[derive(Debug, Clone)]
pub struct DeckUpdateOutcome {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct LobbyManager {
    lobby: GameLobby,
    validator: Arc<dyn DeckValidator>,
}

impl LobbyManager {
    /// Allocate a lobby with a fresh game code and the host as its first
    /// player, open for registration.
    pub fn create(
        settings: LobbySettings,
        host_id: &str,
        host_name: &str,
        validator: Arc<dyn DeckValidator>,
    ) -> Self {
        let lobby = GameLobby {
            game_code: generate_game_code(),
            format: settings.format,
            status: LobbyStatus::Open,
            host_id: host_id.to_string(),
            max_players: settings.max_players,
            min_players: settings.min_players,
            players: vec![Player::new(host_id, host_name, now_ms())],
        };
        info!("lobby {} created by {}", lobby.game_code, host_id);
        Self { lobby, validator }
    }

    pub fn lobby(&self) -> &GameLobby {
        &self.lobby
    }

    pub fn game_code(&self) -> &str {
        &self.lobby.game_code
    }

    /// Clone of the current state, for game-state-sync payloads.
    pub fn snapshot(&self) -> GameLobby {
        self.lobby.clone()
    }

    pub fn add_player(&mut self, id: &str, name: &str) -> Result<(), LobbyError> {
        if self.lobby.status != LobbyStatus::Open {
            return Err(LobbyError::NotOpen);
        }
        if self.lobby.player(id).is_some() {
            return Err(LobbyError::DuplicatePlayer(id.to_string()));
        }
        if self.lobby.is_full() {
            return Err(LobbyError::LobbyFull);
        }
        self.lobby.players.push(Player::new(id, name, now_ms()));
        info!("player {} ({}) joined lobby {}", id, name, self.lobby.game_code);
        Ok(())
    }

    pub fn remove_player(&mut self, id: &str) -> Result<Player, LobbyError> {
        if matches!(
            self.lobby.status,
            LobbyStatus::InProgress | LobbyStatus::Closed
        ) {
            return Err(LobbyError::NotOpen);
        }
        let idx = self
            .lobby
            .players
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| LobbyError::UnknownPlayer(id.to_string()))?;
        let player = self.lobby.players.remove(idx);
        info!("player {} left lobby {}", id, self.lobby.game_code);
        Ok(player)
    }

    pub fn update_player_status(
        &mut self,
        id: &str,
        status: PlayerStatus,
    ) -> Result<(), LobbyError> {
        if self.lobby.status == LobbyStatus::Closed {
            return Err(LobbyError::NotOpen);
        }
        let player = self
            .lobby
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| LobbyError::UnknownPlayer(id.to_string()))?;
        player.status = status;
        Ok(())
    }

    /// Bind a deck to a player and validate it against the lobby format.
    pub fn update_player_deck(
        &mut self,
        id: &str,
        deck: &Deck,
    ) -> Result<DeckUpdateOutcome, LobbyError> {
        if self.lobby.status != LobbyStatus::Open {
            return Err(LobbyError::NotOpen);
        }
        let format = self.lobby.format;
        let player = self
            .lobby
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| LobbyError::UnknownPlayer(id.to_string()))?;

        let validation = self.validator.validate(deck, format);
        player.deck = Some(DeckBinding {
            deck_id: deck.id.clone(),
            deck_name: deck.name.clone(),
            card_count: deck.cards.len(),
            is_valid: validation.is_valid,
        });
        Ok(DeckUpdateOutcome {
            is_valid: validation.is_valid,
            errors: validation.errors,
            warnings: validation.warnings,
        })
    }

    /// Normal start: enough players, everyone ready, every deck valid.
    pub fn can_start_game(&self) -> bool {
        self.lobby.status == LobbyStatus::Open
            && self.lobby.players.len() >= self.lobby.min_players
            && self.lobby.players.iter().all(Player::is_start_ready)
    }

    /// Host-only forced start: readiness is waived, deck validity is not.
    pub fn can_force_start(&self) -> bool {
        self.lobby.status == LobbyStatus::Open
            && self.lobby.players.len() >= self.lobby.min_players
            && self.lobby.players.iter().all(Player::has_valid_deck)
    }

    pub fn update_status(&mut self, to: LobbyStatus) -> Result<(), LobbyError> {
        use LobbyStatus as S;
        let from = self.lobby.status;
        let allowed = match (from, to) {
            _ if from == to => true,
            // Closed is reachable from anywhere and terminal
            (S::Closed, _) => false,
            (_, S::Closed) => true,
            (S::Setup, S::Open) => true,
            (S::Open, S::InProgress) => true,
            _ => false,
        };
        if !allowed {
            return Err(LobbyError::InvalidTransition { from, to });
        }
        if from != to {
            info!("lobby {} status {:?} -> {:?}", self.lobby.game_code, from, to);
            self.lobby.status = to;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::types::GameFormat;
    use crate::validate::FormatSizeValidator;

    fn manager_with(max_players: usize) -> LobbyManager {
        let settings = LobbySettings {
            format: GameFormat::Standard,
            max_players,
            min_players: 2,
        };
        LobbyManager::create(settings, "p-host", "Noor", Arc::new(FormatSizeValidator))
    }

    fn valid_deck() -> Deck {
        Deck {
            id: "d-1".into(),
            name: "Mono Red".into(),
            cards: vec!["Mountain".into(); 60],
        }
    }

    fn short_deck() -> Deck {
        Deck {
            id: "d-2".into(),
            name: "Stub".into(),
            cards: vec!["Island".into(); 10],
        }
    }

    #[test]
    fn test_create_opens_with_host_registered() {
        let m = manager_with(4);
        let lobby = m.lobby();
        assert_eq!(lobby.status, LobbyStatus::Open);
        assert_eq!(lobby.players.len(), 1);
        assert_eq!(lobby.players[0].id, "p-host");
        assert_eq!(lobby.players[0].status, PlayerStatus::NotReady);
        assert_eq!(lobby.game_code.len(), 6);
    }

    #[test]
    fn test_capacity_and_duplicate_checks() {
        let mut m = manager_with(4);
        m.add_player("p-2", "Ari").unwrap();
        m.add_player("p-3", "Bo").unwrap();
        m.add_player("p-4", "Cal").unwrap();

        // Fifth participant is over capacity
        assert_eq!(m.add_player("p-5", "Dee"), Err(LobbyError::LobbyFull));
        assert_eq!(
            m.add_player("p-2", "Ari again"),
            Err(LobbyError::DuplicatePlayer("p-2".into()))
        );
    }

    #[test]
    fn test_full_lobby_start_gating() {
        let mut m = manager_with(4);
        m.add_player("p-2", "Ari").unwrap();
        m.add_player("p-3", "Bo").unwrap();
        m.add_player("p-4", "Cal").unwrap();
        assert!(!m.can_start_game());

        // Everyone binds a valid deck and readies up, one by one
        for id in ["p-host", "p-2", "p-3", "p-4"] {
            assert!(!m.can_start_game());
            let outcome = m.update_player_deck(id, &valid_deck()).unwrap();
            assert!(outcome.is_valid);
            m.update_player_status(id, PlayerStatus::Ready).unwrap();
        }
        assert!(m.can_start_game());
    }

    #[test]
    fn test_invalid_deck_binds_but_blocks_start() {
        let mut m = manager_with(4);
        m.add_player("p-2", "Ari").unwrap();

        m.update_player_deck("p-host", &valid_deck()).unwrap();
        m.update_player_status("p-host", PlayerStatus::Ready).unwrap();

        let outcome = m.update_player_deck("p-2", &short_deck()).unwrap();
        assert!(!outcome.is_valid);
        assert!(!outcome.errors.is_empty());
        // Deck is bound regardless
        assert!(m.lobby().player("p-2").unwrap().deck.is_some());

        m.update_player_status("p-2", PlayerStatus::Ready).unwrap();
        assert!(!m.can_start_game());
        // Force start waives readiness, never deck validity
        assert!(!m.can_force_start());

        m.update_player_deck("p-2", &valid_deck()).unwrap();
        assert!(m.can_start_game());
    }

    #[test]
    fn test_force_start_waives_readiness_only() {
        let mut m = manager_with(4);
        m.add_player("p-2", "Ari").unwrap();
        m.update_player_deck("p-host", &valid_deck()).unwrap();
        m.update_player_deck("p-2", &valid_deck()).unwrap();

        // Nobody is ready
        assert!(!m.can_start_game());
        assert!(m.can_force_start());
    }

    #[test]
    fn test_in_progress_freezes_membership() {
        let mut m = manager_with(4);
        m.add_player("p-2", "Ari").unwrap();
        m.update_status(LobbyStatus::InProgress).unwrap();

        assert_eq!(m.add_player("p-3", "Bo"), Err(LobbyError::NotOpen));
        assert!(matches!(
            m.remove_player("p-2"),
            Err(LobbyError::NotOpen)
        ));
        // Status marking still works mid-game (disconnects)
        m.update_player_status("p-2", PlayerStatus::Disconnected)
            .unwrap();
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut m = manager_with(4);
        m.update_status(LobbyStatus::Closed).unwrap();
        assert_eq!(
            m.update_status(LobbyStatus::Open),
            Err(LobbyError::InvalidTransition {
                from: LobbyStatus::Closed,
                to: LobbyStatus::Open,
            })
        );
    }

    #[test]
    fn test_status_transition_table() {
        let mut m = manager_with(4);
        // Open -> Open is a no-op
        m.update_status(LobbyStatus::Open).unwrap();
        // Open cannot go back to Setup
        assert!(m.update_status(LobbyStatus::Setup).is_err());
        m.update_status(LobbyStatus::InProgress).unwrap();
        // InProgress cannot reopen
        assert!(m.update_status(LobbyStatus::Open).is_err());
        m.update_status(LobbyStatus::Closed).unwrap();
    }

    #[test]
    fn test_min_player_count_gates_start() {
        let mut m = manager_with(4);
        m.update_player_deck("p-host", &valid_deck()).unwrap();
        m.update_player_status("p-host", PlayerStatus::Ready).unwrap();
        // Alone in the lobby: below min_players
        assert!(!m.can_start_game());
        assert!(!m.can_force_start());
    }

    #[test]
    fn test_mutations_on_unknown_player_fail() {
        let mut m = manager_with(4);
        assert!(matches!(
            m.update_player_status("p-ghost", PlayerStatus::Ready),
            Err(LobbyError::UnknownPlayer(_))
        ));
        assert!(matches!(
            m.update_player_deck("p-ghost", &valid_deck()),
            Err(LobbyError::UnknownPlayer(_))
        ));
        assert!(matches!(
            m.remove_player("p-ghost"),
            Err(LobbyError::UnknownPlayer(_))
        ));
    }
}
