/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The decision procedure returned no actions.
    NoActions,
    /// Actions were produced but the rule is inside its cooldown window.
    Throttled { remaining_secs: u64 },
    /// Every action was delivered and the cooldown window started.
    Dispatched { actions: usize },
}
