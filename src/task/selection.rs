//! Event selection
//!
//! Events are rejected, in this order, for an invalid reference multiplicity,
//! a missing or empty primary vertex, pile-up and a displaced vertex.

use crate::config::EventCuts;
use crate::event::Event;

/// Why an event was not processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    Multiplicity,
    NoVertex,
    VertexContributors,
    PileUp,
    VertexZ,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Multiplicity => write!(f, "invalid reference multiplicity"),
            SkipReason::NoVertex => write!(f, "no primary vertex"),
            SkipReason::VertexContributors => write!(f, "too few vertex contributors"),
            SkipReason::PileUp => write!(f, "pile-up"),
            SkipReason::VertexZ => write!(f, "vertex z out of range"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventSelector {
    cuts: EventCuts,
}

impl EventSelector {
    pub fn new(cuts: EventCuts) -> Self {
        Self { cuts }
    }

    pub fn cuts(&self) -> &EventCuts {
        &self.cuts
    }

    pub fn select(&self, event: &Event) -> Result<(), SkipReason> {
        if event.ref_multiplicity < 0.0 {
            return Err(SkipReason::Multiplicity);
        }

        let vertex = event.vertex.as_ref().ok_or(SkipReason::NoVertex)?;
        if vertex.contributors < self.cuts.min_vertex_contributors {
            return Err(SkipReason::VertexContributors);
        }

        if self.cuts.reject_pile_up && event.pile_up {
            return Err(SkipReason::PileUp);
        }

        if vertex.z.abs() > self.cuts.max_vertex_z {
            return Err(SkipReason::VertexZ);
        }

        Ok(())
    }
}
