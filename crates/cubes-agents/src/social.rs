//! Social capability diffusion between neighboring cubes.
//!
//! A cube lacking a capability can pick it up from a neighbor that has it
//! and is willing to teach, or, very rarely, discover it alone. All draws
//! are per-10000 integer rolls against the supplied RNG so tests can seed
//! them.

use rand::Rng;
use tracing::{debug, info};

use cubes_types::{AgentId, AgentPublicState, AgentStatePatch, Capability, Personality, SocialTrait};
use cubes_world::WorldRegistry;

/// Navigation is slightly easier to pass on (+5%).
const NAVIGATION_TEACH_BONUS: u32 = 500;

/// Base spontaneous discovery chance (0.2%), before the personality multiplier.
const DISCOVERY_BASE_PER_10000: u32 = 20;

/// Willingness to teach by personality, per 10000.
const fn personality_teach_factor(personality: Personality) -> u32 {
    match personality {
        Personality::Extrovert => 6000,
        Personality::Curious => 5000,
        Personality::Calm | Personality::Neutral => 4000,
        Personality::Chaotic => 3000,
    }
}

/// Social disposition multiplier, in percent.
const fn social_factor_pct(social_trait: SocialTrait) -> u32 {
    match social_trait {
        SocialTrait::Kind => 100,
        SocialTrait::Selfish => 35,
    }
}

/// Chance that a teacher shares `capability`, per 10000.
pub fn teaching_chance_per_10000(
    personality: Personality,
    social_trait: SocialTrait,
    capability: Capability,
) -> u32 {
    let base = personality_teach_factor(personality)
        .saturating_mul(social_factor_pct(social_trait))
        .checked_div(100)
        .unwrap_or(0);
    let bonus = if capability == Capability::Navigation {
        NAVIGATION_TEACH_BONUS
    } else {
        0
    };
    base.saturating_add(bonus).min(10_000)
}

/// Chance of discovering a capability alone on one draw, per 10000.
///
/// Base 0.2% scaled by curious 2.5, chaotic 2.0, extrovert and neutral
/// 1.0, calm 0.8.
pub const fn discovery_chance_per_10000(personality: Personality) -> u32 {
    let scaled_x10 = match personality {
        Personality::Curious => 25,
        Personality::Chaotic => 20,
        Personality::Extrovert | Personality::Neutral => 10,
        Personality::Calm => 8,
    };
    DISCOVERY_BASE_PER_10000.saturating_mul(scaled_x10) / 10
}

fn roll(chance_per_10000: u32, rng: &mut impl Rng) -> bool {
    let roll: u32 = rng.random_range(0..10_000);
    roll < chance_per_10000
}

/// One Bernoulli draw: does `teacher` share `capability` right now?
pub fn will_teach(teacher: &AgentPublicState, capability: Capability, rng: &mut impl Rng) -> bool {
    let chance = teaching_chance_per_10000(teacher.personality, teacher.social_trait, capability);
    roll(chance, rng)
}

/// A capability passed from one cube to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnOutcome {
    /// What was learned.
    pub learned: Capability,
    /// Who taught it.
    pub taught_by: AgentId,
}

/// Find the first neighbor, in iteration order, that has a needed capability
/// and is willing to teach it.
///
/// Capabilities the learner already has are skipped.
pub fn try_learn_from_neighbors(
    learner: &AgentPublicState,
    neighbors: &[AgentPublicState],
    needed: &[Capability],
    rng: &mut impl Rng,
) -> Option<LearnOutcome> {
    for neighbor in neighbors {
        if neighbor.id == learner.id {
            continue;
        }
        for &capability in needed {
            if learner.has(capability) || !neighbor.has(capability) {
                continue;
            }
            if will_teach(neighbor, capability, rng) {
                return Some(LearnOutcome {
                    learned: capability,
                    taught_by: neighbor.id.clone(),
                });
            }
        }
    }
    None
}

/// One low-probability draw for figuring out `capability` alone.
pub fn spontaneous_discovery(
    personality: Personality,
    capability: Capability,
    rng: &mut impl Rng,
) -> bool {
    let discovered = roll(discovery_chance_per_10000(personality), rng);
    if discovered {
        debug!(%personality, capability = capability.as_str(), "spontaneous discovery");
    }
    discovered
}

/// What a [`social_learning_step`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialEvent {
    /// Learned from a neighbor.
    Taught(LearnOutcome),
    /// Figured it out alone.
    Discovered(Capability),
}

/// Try to acquire one missing capability: first from neighbors within
/// `radius`, then by spontaneous discovery. The registry is updated when
/// something is learned.
pub fn social_learning_step(
    registry: &WorldRegistry,
    id: &AgentId,
    radius: f64,
    rng: &mut impl Rng,
) -> Option<SocialEvent> {
    let state = registry.get(id)?;
    let needed: Vec<Capability> = Capability::ALL
        .into_iter()
        .filter(|c| !state.has(*c))
        .collect();
    if needed.is_empty() {
        return None;
    }

    let neighbors = registry.neighbors(id, state.position, radius);
    let event = try_learn_from_neighbors(&state, &neighbors, &needed, rng)
        .map(SocialEvent::Taught)
        .or_else(|| {
            needed
                .iter()
                .copied()
                .find(|c| spontaneous_discovery(state.personality, *c, rng))
                .map(SocialEvent::Discovered)
        })?;

    let learned = match &event {
        SocialEvent::Taught(outcome) => outcome.learned,
        SocialEvent::Discovered(capability) => *capability,
    };
    let mut capabilities = state.capabilities;
    capabilities.insert(learned);
    let mut progress = state.learning_progress;
    progress.insert(learned, 1.0);
    registry.update(
        id,
        AgentStatePatch {
            capabilities: Some(capabilities),
            learning_progress: Some(progress),
            ..AgentStatePatch::default()
        },
    );

    match &event {
        SocialEvent::Taught(outcome) => info!(
            agent_id = %id,
            teacher = %outcome.taught_by,
            capability = learned.as_str(),
            "capability learned from neighbor"
        ),
        SocialEvent::Discovered(_) => info!(
            agent_id = %id,
            capability = learned.as_str(),
            "capability discovered"
        ),
    }
    Some(event)
}
