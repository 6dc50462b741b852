//! Reconcile trait and the shared convergence decision

use crate::state::DeclaredState;

/// What a convergence run did to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Resource was created
    Created,
    /// Resource existed but was re-applied (forced refresh)
    Refreshed,
    /// Resource was removed
    Removed,
    /// Already in the declared state
    Unchanged,
}

impl Outcome {
    /// Whether remote state was mutated. Gates notify execution.
    pub fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Contract every compound action kind implements.
///
/// `exists` must be a read-only probe; `create` and `delete` issue the
/// remote commands and transfers that move the resource to its declared
/// state. The decision between them is not the implementation's job -
/// [`converge`] owns it, in a fixed order, for every kind.
pub trait Reconcile {
    type Error;

    /// Action kind, e.g. "apt.pkg"
    fn kind(&self) -> &'static str;

    /// Resource name within the kind
    fn name(&self) -> &str;

    /// The end-state the step declared
    fn state(&self) -> &DeclaredState;

    /// Read-only probe. Never mutates remote state.
    fn exists(&self) -> Result<bool, Self::Error>;

    fn create(&self) -> Result<(), Self::Error>;

    fn delete(&self) -> Result<(), Self::Error>;

    /// Whether an existing resource must be re-applied anyway
    /// (e.g. a package declared `latest`).
    fn refresh_when_present(&self) -> bool {
        false
    }
}

/// Drive one full convergence cycle.
///
/// Decision order:
/// 1. declared absent + exists       -> delete, changed
/// 2. declared absent + absent       -> no-op
/// 3. absent (any other state)       -> create, changed
/// 4. exists + forced refresh        -> create again, changed
/// 5. otherwise                      -> no-op
///
/// Running the cycle twice against unchanged remote state yields
/// changed = true then changed = false.
pub fn converge<R: Reconcile>(resource: &R) -> Result<Outcome, R::Error> {
    let exists = resource.exists()?;

    if resource.state().is_absent() {
        if exists {
            resource.delete()?;
            return Ok(Outcome::Removed);
        }

        return Ok(Outcome::Unchanged);
    }

    if !exists {
        resource.create()?;
        return Ok(Outcome::Created);
    }

    if resource.refresh_when_present() {
        resource.create()?;
        return Ok(Outcome::Refreshed);
    }

    Ok(Outcome::Unchanged)
}
