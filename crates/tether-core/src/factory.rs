use crate::error::ConstructionError;
use crate::peer::PeerHandle;
use crate::NodeIdentity;

/// Constructs the peer for one node identity, at most once.
///
/// Later renders of the same identity get the existing instance back without
/// touching the constructor. A failed construction leaves the factory empty,
/// so the next render retries with that render's props.
pub struct ElementFactory<P> {
    identity: NodeIdentity,
    instance: Option<PeerHandle<P>>,
    constructions: usize,
    released: bool,
}

impl<P> ElementFactory<P> {
    pub fn new(identity: NodeIdentity) -> Self {
        Self {
            identity,
            instance: None,
            constructions: 0,
            released: false,
        }
    }

    pub fn identity(&self) -> NodeIdentity {
        self.identity
    }

    /// Return the live instance, constructing it on first use.
    pub fn ensure(
        &mut self,
        construct: impl FnOnce() -> Result<P, ConstructionError>,
    ) -> Result<&PeerHandle<P>, ConstructionError> {
        if self.released {
            return Err(ConstructionError::invalid(format!(
                "factory for node {} already released its peer",
                self.identity
            )));
        }
        let instance = match self.instance.take() {
            Some(instance) => instance,
            None => {
                let peer = construct()?;
                self.constructions += 1;
                log::debug!("constructed peer for node {}", self.identity);
                PeerHandle::new(self.identity, peer)
            }
        };
        Ok(self.instance.insert(instance))
    }

    pub fn get(&self) -> Option<&PeerHandle<P>> {
        self.instance.as_ref()
    }

    /// Number of successful constructions; never exceeds one.
    pub fn constructions(&self) -> usize {
        self.constructions
    }

    /// Give up the instance and mark every outstanding handle as released.
    pub fn release(&mut self) -> Option<PeerHandle<P>> {
        self.released = true;
        let instance = self.instance.take()?;
        instance.release();
        log::debug!("released peer for node {}", self.identity);
        Some(instance)
    }
}

impl<P> Drop for ElementFactory<P> {
    fn drop(&mut self) {
        self.release();
    }
}
