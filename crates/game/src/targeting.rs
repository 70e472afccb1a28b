use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::mob::MobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    #[serde(rename = "self")]
    SelfOnly,
    Enemy,
    Ally,
    Ground,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum AoeShape {
    Single,
    Circle { radius: f32 },
    Cone { angle_deg: f32, length: f32 },
    Line { length: f32, width: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionMode {
    Facing,
    Target,
    Cursor,
}

/// Client-supplied target of an ability request.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetSpec {
    pub target_entity_id: Option<MobId>,
    pub target_point: Option<Vec3>,
    pub direction: Option<Vec3>,
}

/// Transient per-call view of a mob, built by the caller.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub id: MobId,
    pub position: Vec3,
    pub faction_id: u32,
    pub alive: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: MobId,
    pub position: Vec3,
    pub facing_yaw: f32,
    pub faction_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetingError {
    #[error("target entity missing or not found")]
    MissingTargetEntity,
    #[error("target point missing")]
    MissingTargetPoint,
    #[error("target allegiance does not match ability target type")]
    WrongAllegiance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Affected mob ids, sorted ascending.
    pub targets: Vec<MobId>,
    pub target_position: Vec3,
}

pub fn forward_from_yaw(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

pub fn yaw_from_direction(dir: Vec3) -> f32 {
    dir.x.atan2(dir.z)
}

/// Pure target resolution: (ability targeting, actor, target spec, candidate
/// list) to (sorted target set, target position).
pub fn resolve_targets(
    target_type: TargetType,
    aoe_shape: AoeShape,
    direction_mode: DirectionMode,
    actor: &Actor,
    spec: &TargetSpec,
    candidates: &[Candidate],
) -> Result<Resolution, TargetingError> {
    let primary = resolve_primary(target_type, actor, spec, candidates)?;

    let aim_yaw = resolve_direction_yaw(direction_mode, actor, spec, primary.position);

    let mut targets = match aoe_shape {
        AoeShape::Single => match primary.id {
            Some(id) => vec![id],
            None => Vec::new(),
        },
        AoeShape::Circle { radius } => {
            let center = match target_type {
                TargetType::SelfOnly => actor.position,
                _ => primary.position,
            };
            collect(candidates, target_type, actor, |c| {
                horizontal_distance_sq(c.position, center) <= radius * radius
            })
        }
        AoeShape::Cone { angle_deg, length } => {
            let origin = cone_origin(target_type, actor, primary.position);
            let forward = forward_from_yaw(aim_yaw);
            let half_angle = (angle_deg.to_radians() / 2.0).max(0.0);
            collect(candidates, target_type, actor, |c| {
                let to = horizontal(c.position - origin);
                let dist_sq = to.length_squared();
                if dist_sq > length * length {
                    return false;
                }
                if dist_sq < f32::EPSILON {
                    return true;
                }
                to.normalize().dot(forward).clamp(-1.0, 1.0).acos() <= half_angle
            })
        }
        AoeShape::Line { length, width } => {
            let origin = cone_origin(target_type, actor, primary.position);
            let forward = forward_from_yaw(aim_yaw);
            let half_width = width / 2.0;
            collect(candidates, target_type, actor, |c| {
                let to = horizontal(c.position - origin);
                let along = to.dot(forward);
                if along < 0.0 || along > length {
                    return false;
                }
                let lateral = (to - forward * along).length();
                lateral <= half_width
            })
        }
    };

    targets.sort_unstable();
    targets.dedup();

    Ok(Resolution {
        targets,
        target_position: primary.position,
    })
}

struct Primary {
    id: Option<MobId>,
    position: Vec3,
}

fn resolve_primary(
    target_type: TargetType,
    actor: &Actor,
    spec: &TargetSpec,
    candidates: &[Candidate],
) -> Result<Primary, TargetingError> {
    match target_type {
        TargetType::SelfOnly => Ok(Primary {
            id: Some(actor.id),
            position: actor.position,
        }),
        TargetType::Enemy | TargetType::Ally => {
            let id = spec
                .target_entity_id
                .ok_or(TargetingError::MissingTargetEntity)?;
            let candidate = candidates
                .iter()
                .find(|c| c.id == id && c.alive)
                .ok_or(TargetingError::MissingTargetEntity)?;
            let is_ally = candidate.faction_id == actor.faction_id;
            let wanted_ally = target_type == TargetType::Ally;
            if is_ally != wanted_ally {
                return Err(TargetingError::WrongAllegiance);
            }
            Ok(Primary {
                id: Some(id),
                position: candidate.position,
            })
        }
        TargetType::Ground => {
            let point = spec.target_point.ok_or(TargetingError::MissingTargetPoint)?;
            Ok(Primary {
                id: None,
                position: point,
            })
        }
    }
}

fn resolve_direction_yaw(
    mode: DirectionMode,
    actor: &Actor,
    spec: &TargetSpec,
    primary_position: Vec3,
) -> f32 {
    let fallback = actor.facing_yaw;
    let dir = match mode {
        DirectionMode::Facing => return fallback,
        DirectionMode::Target => horizontal(primary_position - actor.position),
        DirectionMode::Cursor => match spec.direction {
            Some(d) => horizontal(d),
            None => match spec.target_point {
                Some(p) => horizontal(p - actor.position),
                None => horizontal(primary_position - actor.position),
            },
        },
    };
    if dir.length_squared() < 1e-6 {
        fallback
    } else {
        yaw_from_direction(dir)
    }
}

fn cone_origin(target_type: TargetType, actor: &Actor, primary_position: Vec3) -> Vec3 {
    match target_type {
        TargetType::Ground => primary_position,
        _ => actor.position,
    }
}

fn collect(
    candidates: &[Candidate],
    target_type: TargetType,
    actor: &Actor,
    mut inside: impl FnMut(&Candidate) -> bool,
) -> Vec<MobId> {
    candidates
        .iter()
        .filter(|c| c.alive)
        .filter(|c| allegiance_matches(target_type, actor, c))
        .filter(|c| inside(c))
        .map(|c| c.id)
        .collect()
}

/// Self and ally shapes affect allies (the actor included); enemy and ground
/// shapes affect enemies.
fn allegiance_matches(target_type: TargetType, actor: &Actor, candidate: &Candidate) -> bool {
    let is_ally = candidate.faction_id == actor.faction_id;
    match target_type {
        TargetType::SelfOnly | TargetType::Ally => is_ally,
        TargetType::Enemy | TargetType::Ground => !is_ally,
    }
}

fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

fn horizontal_distance_sq(a: Vec3, b: Vec3) -> f32 {
    horizontal(a - b).length_squared()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor_at(pos: Vec3, yaw: f32) -> Actor {
        Actor {
            id: 1,
            position: pos,
            facing_yaw: yaw,
            faction_id: 1,
        }
    }

    fn enemy(id: MobId, pos: Vec3) -> Candidate {
        Candidate {
            id,
            position: pos,
            faction_id: 2,
            alive: true,
        }
    }

    fn ally(id: MobId, pos: Vec3) -> Candidate {
        Candidate {
            id,
            position: pos,
            faction_id: 1,
            alive: true,
        }
    }

    #[test]
    fn single_enemy_resolves_to_target() {
        let actor = actor_at(Vec3::ZERO, 0.0);
        let candidates = [enemy(7, Vec3::new(3.0, 0.0, 0.0))];
        let spec = TargetSpec {
            target_entity_id: Some(7),
            ..Default::default()
        };

        let res = resolve_targets(
            TargetType::Enemy,
            AoeShape::Single,
            DirectionMode::Target,
            &actor,
            &spec,
            &candidates,
        )
        .unwrap();

        assert_eq!(res.targets, vec![7]);
        assert_eq!(res.target_position, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn missing_entity_fails() {
        let actor = actor_at(Vec3::ZERO, 0.0);
        let spec = TargetSpec {
            target_entity_id: Some(99),
            ..Default::default()
        };
        let err = resolve_targets(
            TargetType::Enemy,
            AoeShape::Single,
            DirectionMode::Target,
            &actor,
            &spec,
            &[],
        )
        .unwrap_err();
        assert_eq!(err, TargetingError::MissingTargetEntity);
    }

    #[test]
    fn ally_targeting_enemy_is_wrong_allegiance() {
        let actor = actor_at(Vec3::ZERO, 0.0);
        let candidates = [enemy(7, Vec3::new(1.0, 0.0, 0.0))];
        let spec = TargetSpec {
            target_entity_id: Some(7),
            ..Default::default()
        };
        let err = resolve_targets(
            TargetType::Ally,
            AoeShape::Single,
            DirectionMode::Target,
            &actor,
            &spec,
            &candidates,
        )
        .unwrap_err();
        assert_eq!(err, TargetingError::WrongAllegiance);
    }

    #[test]
    fn ground_single_is_empty_set() {
        let actor = actor_at(Vec3::ZERO, 0.0);
        let spec = TargetSpec {
            target_point: Some(Vec3::new(4.0, 0.0, 4.0)),
            ..Default::default()
        };
        let res = resolve_targets(
            TargetType::Ground,
            AoeShape::Single,
            DirectionMode::Cursor,
            &actor,
            &spec,
            &[],
        )
        .unwrap();
        assert!(res.targets.is_empty());
        assert_eq!(res.target_position, Vec3::new(4.0, 0.0, 4.0));
    }

    #[test]
    fn circle_on_ground_point_hits_enemies_inside() {
        let actor = actor_at(Vec3::ZERO, 0.0);
        let candidates = [
            enemy(2, Vec3::new(10.0, 0.0, 0.0)),
            enemy(3, Vec3::new(12.5, 0.0, 0.0)),
            enemy(4, Vec3::new(20.0, 0.0, 0.0)),
            ally(5, Vec3::new(10.0, 0.0, 1.0)),
        ];
        let spec = TargetSpec {
            target_point: Some(Vec3::new(10.0, 0.0, 0.0)),
            ..Default::default()
        };
        let res = resolve_targets(
            TargetType::Ground,
            AoeShape::Circle { radius: 3.0 },
            DirectionMode::Cursor,
            &actor,
            &spec,
            &candidates,
        )
        .unwrap();
        assert_eq!(res.targets, vec![2, 3]);
    }

    #[test]
    fn cone_respects_angle_and_length() {
        // facing +z
        let actor = actor_at(Vec3::ZERO, 0.0);
        let candidates = [
            enemy(2, Vec3::new(0.0, 0.0, 5.0)),   // straight ahead
            enemy(3, Vec3::new(5.0, 0.0, 0.0)),   // 90 degrees off
            enemy(4, Vec3::new(0.0, 0.0, 50.0)),  // too far
            enemy(5, Vec3::new(1.0, 0.0, 5.0)),   // slightly off axis
        ];
        let spec = TargetSpec::default();
        let res = resolve_targets(
            TargetType::Enemy,
            AoeShape::Cone {
                angle_deg: 60.0,
                length: 10.0,
            },
            DirectionMode::Facing,
            &actor,
            &spec,
            &candidates,
        );
        // Enemy target type needs a primary entity; use self-origin via ground? No:
        // cone abilities aimed by facing still carry a primary entity in this
        // ruleset, so pick one.
        let spec = TargetSpec {
            target_entity_id: Some(2),
            ..Default::default()
        };
        let res2 = resolve_targets(
            TargetType::Enemy,
            AoeShape::Cone {
                angle_deg: 60.0,
                length: 10.0,
            },
            DirectionMode::Facing,
            &actor,
            &spec,
            &candidates,
        )
        .unwrap();
        assert_eq!(res2.targets, vec![2, 5]);
        assert!(res.is_err());
    }

    #[test]
    fn line_respects_width_and_length() {
        let actor = actor_at(Vec3::ZERO, 0.0);
        let candidates = [
            enemy(2, Vec3::new(0.2, 0.0, 4.0)),
            enemy(3, Vec3::new(3.0, 0.0, 4.0)),
            enemy(4, Vec3::new(0.0, 0.0, 12.0)),
            enemy(5, Vec3::new(0.0, 0.0, -2.0)),
        ];
        let spec = TargetSpec {
            target_entity_id: Some(2),
            ..Default::default()
        };
        let res = resolve_targets(
            TargetType::Enemy,
            AoeShape::Line {
                length: 10.0,
                width: 2.0,
            },
            DirectionMode::Facing,
            &actor,
            &spec,
            &candidates,
        )
        .unwrap();
        assert_eq!(res.targets, vec![2]);
    }

    #[test]
    fn cursor_direction_falls_back_to_facing_on_zero_vector() {
        let actor = actor_at(Vec3::ZERO, std::f32::consts::FRAC_PI_2); // facing +x
        let candidates = [enemy(2, Vec3::new(5.0, 0.0, 0.0))];
        let spec = TargetSpec {
            target_entity_id: Some(2),
            direction: Some(Vec3::ZERO),
            ..Default::default()
        };
        let res = resolve_targets(
            TargetType::Enemy,
            AoeShape::Cone {
                angle_deg: 45.0,
                length: 10.0,
            },
            DirectionMode::Cursor,
            &actor,
            &spec,
            &candidates,
        )
        .unwrap();
        assert_eq!(res.targets, vec![2]);
    }

    #[test]
    fn dead_candidates_are_skipped() {
        let actor = actor_at(Vec3::ZERO, 0.0);
        let mut corpse = enemy(2, Vec3::new(0.0, 0.0, 2.0));
        corpse.alive = false;
        let spec = TargetSpec {
            target_point: Some(Vec3::ZERO),
            ..Default::default()
        };
        let res = resolve_targets(
            TargetType::Ground,
            AoeShape::Circle { radius: 5.0 },
            DirectionMode::Cursor,
            &actor,
            &spec,
            &[corpse],
        )
        .unwrap();
        assert!(res.targets.is_empty());
    }
}
