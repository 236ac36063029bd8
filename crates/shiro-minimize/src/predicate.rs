//! Error matching and the base-replay consensus gate (§4.8).

use shiro_types::ReplayKind;

/// The shape of a server-reported failure the `case_error`/`error_sql`
/// replay kinds compare against. Deliberately coarse: only what the
/// matching rule needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    Server { code: u16 },
    Panic,
}

/// "No substring fallback": two errors match only when they carry the
/// same MySQL error number, or are both panics. Anything else -- a
/// server error against a panic, or two errors without a shared number --
/// never matches, so the minimizer cannot collapse onto an unrelated
/// failure.
pub fn errors_match(expected: &ReplayError, actual: &ReplayError) -> bool {
    match (expected, actual) {
        (ReplayError::Server { code: a }, ReplayError::Server { code: b }) => a == b,
        (ReplayError::Panic, ReplayError::Panic) => true,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusOutcome {
    pub reproducible: bool,
    pub flaky: bool,
}

impl ConsensusOutcome {
    pub const NOT_REPRODUCIBLE: ConsensusOutcome = ConsensusOutcome { reproducible: false, flaky: false };
}

/// Runs `attempt` three times and applies the consensus rule: 2-of-3
/// successes passes strict for every replay kind; for `case_error`, a
/// strict failure falls back to 1-of-3 and marks the outcome `flaky`.
/// Anything short of that reports not reproducible, which the caller
/// records as `skipped` with reason `base_replay_not_reproducible`.
pub async fn base_replay_gate<F, Fut>(kind: ReplayKind, mut attempt: F) -> ConsensusOutcome
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let mut successes = 0;
    for _ in 0..3 {
        if attempt().await {
            successes += 1;
        }
    }

    if successes >= 2 {
        return ConsensusOutcome { reproducible: true, flaky: false };
    }
    if matches!(kind, ReplayKind::CaseError) && successes >= 1 {
        return ConsensusOutcome { reproducible: true, flaky: true };
    }
    ConsensusOutcome::NOT_REPRODUCIBLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_error_code_matches() {
        let a = ReplayError::Server { code: 1062 };
        let b = ReplayError::Server { code: 1062 };
        assert!(errors_match(&a, &b));
    }

    #[test]
    fn different_error_codes_do_not_match() {
        let a = ReplayError::Server { code: 1062 };
        let b = ReplayError::Server { code: 1064 };
        assert!(!errors_match(&a, &b));
    }

    #[test]
    fn panic_never_matches_a_server_error() {
        assert!(!errors_match(&ReplayError::Panic, &ReplayError::Server { code: 1062 }));
    }

    #[tokio::test]
    async fn strict_two_of_three_passes_for_signature_kind() {
        let mut results = vec![true, false, true].into_iter();
        let outcome = base_replay_gate(ReplayKind::Signature, || {
            let r = results.next().unwrap();
            async move { r }
        })
        .await;
        assert_eq!(outcome, ConsensusOutcome { reproducible: true, flaky: false });
    }

    #[tokio::test]
    async fn case_error_falls_back_to_lenient_and_marks_flaky() {
        let mut results = vec![false, true, false].into_iter();
        let outcome = base_replay_gate(ReplayKind::CaseError, || {
            let r = results.next().unwrap();
            async move { r }
        })
        .await;
        assert_eq!(outcome, ConsensusOutcome { reproducible: true, flaky: true });
    }

    #[tokio::test]
    async fn signature_kind_never_gets_the_lenient_fallback() {
        let mut results = vec![false, true, false].into_iter();
        let outcome = base_replay_gate(ReplayKind::Signature, || {
            let r = results.next().unwrap();
            async move { r }
        })
        .await;
        assert_eq!(outcome, ConsensusOutcome::NOT_REPRODUCIBLE);
    }
}
