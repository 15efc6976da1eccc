// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// Votes received by each candidate of one party in one county.
///
/// Iteration is in lexicographic candidate order, which pins down the
/// tie-break outcome of the winner scan.
pub type Tally = BTreeMap<String, u64>;

/// The tally of every party contested in one county.
pub type CountyTallies = BTreeMap<String, Tally>;

/// The tallies of every county of one state, keyed by county name.
pub type StateTallies = BTreeMap<String, CountyTallies>;

/// A full primary dataset, keyed by state name.
pub type PrimaryResults = BTreeMap<String, StateTallies>;

// ******** Output data structures *********

/// The winning candidate of each party.
pub type PartyWinners = BTreeMap<String, String>;

/// Party winners for every county of one state.
pub type CountyWinners = BTreeMap<String, PartyWinners>;

/// Party winners for every county of every state.
pub type ElectionWinners = BTreeMap<String, CountyWinners>;

// ******** Errors *********

/// Errors that prevent winners from being resolved.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TallyError {
    /// The requested state does not appear in the dataset.
    UnknownState { state: String },
    /// The requested county does not appear under that state.
    UnknownCounty { state: String, county: String },
    /// A party was recorded with no candidates at all. This is malformed
    /// input data rather than a bad request.
    EmptyTally {
        state: String,
        county: String,
        party: String,
    },
}

impl Error for TallyError {}

impl Display for TallyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TallyError::UnknownState { state } => {
                write!(f, "{} not in primary results.", state)
            }
            TallyError::UnknownCounty { state, county } => {
                write!(f, "{} not in {} primary results.", county, state)
            }
            TallyError::EmptyTally {
                state,
                county,
                party,
            } => {
                write!(
                    f,
                    "no candidates recorded for party {} in {} ({})",
                    party, county, state
                )
            }
        }
    }
}
