mod model;
use log::debug;

pub use crate::model::*;

/// Returns the candidate holding the most votes in this tally, or `None`
/// if the tally has no candidates.
///
/// A candidate must strictly exceed the running maximum to take the lead,
/// so the first candidate in iteration order wins among tied maxima. Since
/// a [Tally] iterates in lexicographic candidate order, the winner of a tie
/// is the lexicographically first tied candidate. This makes the outcome
/// reproducible across loads and serializations of the same dataset, which
/// the document order of a JSON file is not.
pub fn tally_winner(tally: &Tally) -> Option<&str> {
    let mut leader: Option<(&str, u64)> = None;
    for (candidate, &votes) in tally.iter() {
        let leads = match leader {
            Some((_, top)) => votes > top,
            None => true,
        };
        if leads {
            leader = Some((candidate.as_str(), votes));
        }
    }
    leader.map(|(candidate, _)| candidate)
}

// The single place where a tally is turned into a winner with its position
// attached. The state- and all-level traversals are built on top of this so
// that the three query scopes cannot diverge in tie-break semantics.
fn fold_county(
    state: &str,
    county: &str,
    tallies: &CountyTallies,
) -> Result<PartyWinners, TallyError> {
    let mut winners = PartyWinners::new();
    for (party, tally) in tallies.iter() {
        match tally_winner(tally) {
            Some(candidate) => {
                winners.insert(party.clone(), candidate.to_string());
            }
            None => {
                return Err(TallyError::EmptyTally {
                    state: state.to_string(),
                    county: county.to_string(),
                    party: party.clone(),
                });
            }
        }
    }
    Ok(winners)
}

fn fold_state(state: &str, counties: &StateTallies) -> Result<CountyWinners, TallyError> {
    let mut winners = CountyWinners::new();
    for (county, tallies) in counties.iter() {
        winners.insert(county.clone(), fold_county(state, county, tallies)?);
    }
    Ok(winners)
}

/// Resolves the winning candidate of every party in a single county.
///
/// Arguments:
/// * `results` the full primary dataset
/// * `state` the name of the state, as it appears in the dataset
/// * `county` the name of the county within that state
///
/// Fails with [TallyError::UnknownState] or [TallyError::UnknownCounty]
/// before any aggregation work when a key is absent. Both checks always
/// run, so a county missing from a valid state gets its own error.
pub fn county_winners(
    results: &PrimaryResults,
    state: &str,
    county: &str,
) -> Result<PartyWinners, TallyError> {
    let counties = results.get(state).ok_or_else(|| TallyError::UnknownState {
        state: state.to_string(),
    })?;
    let tallies = counties
        .get(county)
        .ok_or_else(|| TallyError::UnknownCounty {
            state: state.to_string(),
            county: county.to_string(),
        })?;
    debug!(
        "county_winners: {} parties contested in {} / {}",
        tallies.len(),
        county,
        state
    );
    fold_county(state, county, tallies)
}

/// Resolves the party winners of every county in a state.
pub fn state_winners(
    results: &PrimaryResults,
    state: &str,
) -> Result<CountyWinners, TallyError> {
    let counties = results.get(state).ok_or_else(|| TallyError::UnknownState {
        state: state.to_string(),
    })?;
    debug!("state_winners: {} counties in {}", counties.len(), state);
    fold_state(state, counties)
}

/// Resolves the party winners of every county of every state in the
/// dataset. An empty dataset yields an empty map.
pub fn all_winners(results: &PrimaryResults) -> Result<ElectionWinners, TallyError> {
    let mut winners = ElectionWinners::new();
    for (state, counties) in results.iter() {
        winners.insert(state.clone(), fold_state(state, counties)?);
    }
    Ok(winners)
}
