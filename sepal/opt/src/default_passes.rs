//! Defines the default passes available to [PassManager].
use crate::passes::{
    AccessCounter, LoopFlop, PinConnector, Pipeline, WellFormed,
};
use crate::traversal::Named;
use crate::{
    pass_manager::{PassManager, PassResult},
    register_alias,
};

impl PassManager {
    pub fn default_passes() -> PassResult<Self> {
        // Construct the pass manager and register all passes.
        let mut pm = PassManager::default();

        // Validation passes
        pm.register_diagnostic::<WellFormed>()?;

        // Analysis and scheduling passes
        pm.register_pass::<AccessCounter>()?;
        pm.register_pass::<PinConnector>()?;
        pm.register_pass::<Pipeline>()?;
        pm.register_pass::<LoopFlop>()?;

        register_alias!(pm, "validate", [WellFormed]);

        // Default flow. Counting runs before scheduling so arbitration
        // flags are in place, the connector runs before depth analysis so
        // merge gates are measured, and loop-flop runs last over the final
        // structure.
        register_alias!(
            pm,
            "schedule",
            [WellFormed, AccessCounter, PinConnector, Pipeline, LoopFlop]
        );

        register_alias!(pm, "all", ["schedule"]);

        register_alias!(pm, "none", []);

        Ok(pm)
    }
}

#[cfg(test)]
mod tests {
    use crate::pass_manager::PassManager;

    #[test]
    fn help_covers_passes_and_aliases() {
        let pm = PassManager::default_passes().unwrap();

        let pipeline = pm.specific_help("pipeline").unwrap();
        assert!(pipeline.contains("insert registers"));
        assert!(pipeline.contains("gate-depth"));

        let alias = pm.specific_help("schedule").unwrap();
        assert!(alias.contains("- well-formed"));
        assert!(alias.contains("- loop-flop"));
        assert!(pm.specific_help("no-such-pass").is_none());

        let all = pm.complete_help();
        for pass in [
            "well-formed",
            "access-counter",
            "pin-connector",
            "pipeline",
            "loop-flop",
        ] {
            assert!(all.contains(pass), "missing {pass}");
        }
        assert!(all.contains("Aliases:"));
        assert!(all.contains("- none:"));
    }
}
