//! Sudden-death elimination for a tiebreaker that stayed level.
//!
//! Contenders are paired in alphabetical order; an odd one out gets a bye.
//! Each pairing is replayed until decisive, up to the configured number of
//! attempts, after which a fair coin decides. Rounds repeat until one
//! contender remains.

use rand::Rng;
use tracing::{info, warn};

use super::{EngineError, GroupStageEngine};
use crate::cancel::CancelToken;
use crate::executor::MatchRequest;
use crate::models::{
    compare_names, MatchResult, Pairing, Participant, ResolutionMethod, TournamentEvent,
};

/// Everything sudden death produced. Nothing is applied to the engine until
/// the whole run has succeeded.
pub(super) struct SuddenDeathOutcome {
    pub champion: Participant,
    pub results: Vec<MatchResult>,

    /// `MatchCompleted` per attempt and `SuddenDeathResolved` per pairing,
    /// in the order they happened
    pub events: Vec<TournamentEvent>,
}

impl GroupStageEngine {
    pub(super) async fn run_sudden_death(
        &mut self,
        mut contenders: Vec<Participant>,
        cancel: &CancelToken,
    ) -> Result<SuddenDeathOutcome, EngineError> {
        let state = self.state()?;
        let tournament_id = state.id;
        let game_type = state.game_type.clone();
        let move_timeout = self.config.move_timeout();
        let max_attempts = self.config.sudden_death_max_attempts.max(1);

        let mut results = Vec::new();
        let mut events = Vec::new();
        let mut round = 1u32;

        contenders.sort_by(|a, b| compare_names(&a.name, &b.name));
        while contenders.len() > 1 {
            info!(round, remaining = contenders.len(), "Sudden-death round");
            let mut survivors = Vec::with_capacity(contenders.len() / 2 + 1);

            for pair in contenders.chunks(2) {
                let [first, second] = pair else {
                    info!(participant = %pair[0].name, "Sudden-death bye");
                    survivors.push(pair[0].clone());
                    continue;
                };
                let pairing = Pairing::new(first.clone(), second.clone());

                let mut winner: Option<&Participant> = None;
                let mut attempts = 0;
                while attempts < max_attempts {
                    if cancel.is_cancelled() {
                        return Err(EngineError::Cancelled);
                    }
                    attempts += 1;
                    let request = MatchRequest::new(&pairing, game_type.clone(), move_timeout);
                    let result = self.executor.execute(request, cancel.clone()).await?;
                    if result.key() != pairing.key() {
                        return Err(EngineError::PairingNotScheduled {
                            player1: result.player1,
                            player2: result.player2,
                        });
                    }

                    // Executors may report the sides in either order.
                    winner = result
                        .winner_name()
                        .and_then(|name| [first, second].into_iter().find(|p| p.is_named(name)));
                    events.push(TournamentEvent::match_completed(
                        tournament_id,
                        results.len(),
                        &result,
                    ));
                    results.push(result);
                    if winner.is_some() {
                        break;
                    }
                }

                let (won, method) = match winner {
                    Some(won) => (won, ResolutionMethod::Decisive),
                    None => {
                        let won = if self.rng.gen_bool(0.5) { first } else { second };
                        warn!(
                            player1 = %first.name,
                            player2 = %second.name,
                            attempts,
                            "Sudden death undecided, settled by coin flip"
                        );
                        (won, ResolutionMethod::CoinFlip)
                    }
                };
                let lost = if won.is_named(&first.name) { second } else { first };

                info!(winner = %won.name, loser = %lost.name, attempts, ?method, "Sudden-death pairing resolved");
                events.push(TournamentEvent::SuddenDeathResolved {
                    tournament_id,
                    winner: won.name.clone(),
                    loser: lost.name.clone(),
                    attempts,
                    method,
                });
                survivors.push(won.clone());
            }

            survivors.sort_by(|a, b| compare_names(&a.name, &b.name));
            contenders = survivors;
            round += 1;
        }

        let champion = contenders
            .pop()
            .ok_or_else(|| EngineError::InvalidInput("no sudden-death contenders".to_string()))?;
        Ok(SuddenDeathOutcome {
            champion,
            results,
            events,
        })
    }
}
