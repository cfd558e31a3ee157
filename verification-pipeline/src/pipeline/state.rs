use state_machines::state_machine;

state_machine! {
    name: VerificationMachine,
    state: VerificationState,
    initial: Ready,
    states: [Ready, ClaimsExtracted, LinksScored, EvidenceSelected, Bound, Deduplicated, Composed, Failed],
    events {
        extract_claims { transition: { from: Ready, to: ClaimsExtracted } }
        score_links { transition: { from: ClaimsExtracted, to: LinksScored } }
        select_evidence { transition: { from: LinksScored, to: EvidenceSelected } }
        bind { transition: { from: EvidenceSelected, to: Bound } }
        deduplicate { transition: { from: Bound, to: Deduplicated } }
        compose { transition: { from: Deduplicated, to: Composed } }
        abort {
            transition: { from: Ready, to: Failed }
            transition: { from: ClaimsExtracted, to: Failed }
            transition: { from: LinksScored, to: Failed }
            transition: { from: EvidenceSelected, to: Failed }
            transition: { from: Bound, to: Failed }
            transition: { from: Deduplicated, to: Failed }
            transition: { from: Composed, to: Failed }
        }
    }
}

pub fn ready() -> VerificationMachine<(), Ready> {
    VerificationMachine::new(())
}
