use super::ConstructPass;
use crate::pass_manager::PassResult;
use sepal_ir::Design;

/// A transformation or analysis over a whole design.
///
/// Passes are plain functions over the design; anything that needs to walk
/// the component tree goes through the shared analyses instead of ad-hoc
/// recursion, so the traversal rules (dataflow order, feedback seeding,
/// atomic boundaries) live in exactly one place.
pub trait Pass {
    fn run(&mut self, design: &mut Design) -> PassResult<()>;

    /// Construct this pass from the option strings and run it.
    fn do_pass_default(
        design: &mut Design,
        extra_opts: &[String],
    ) -> PassResult<Self>
    where
        Self: ConstructPass + Sized,
    {
        let mut pass = Self::from(extra_opts)?;
        pass.run(design)?;
        Ok(pass)
    }
}
