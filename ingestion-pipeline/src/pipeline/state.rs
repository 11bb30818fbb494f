use state_machines::state_machine;

state_machine! {
    name: RecordMachine,
    state: RecordState,
    initial: Ready,
    states: [Ready, Fetched, Normalized, Enriched, Committed, Rejected, Failed],
    events {
        fetch { transition: { from: Ready, to: Fetched } }
        normalize { transition: { from: Fetched, to: Normalized } }
        enrich { transition: { from: Normalized, to: Enriched } }
        commit { transition: { from: Enriched, to: Committed } }
        reject {
            transition: { from: Ready, to: Rejected }
            transition: { from: Enriched, to: Rejected }
        }
        abort {
            transition: { from: Ready, to: Failed }
            transition: { from: Fetched, to: Failed }
            transition: { from: Normalized, to: Failed }
            transition: { from: Enriched, to: Failed }
        }
    }
}

pub fn ready() -> RecordMachine<(), Ready> {
    RecordMachine::new(())
}
