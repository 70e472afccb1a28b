use crate::mob::{MobId, Mobs};

/// Copies combat state and the current top-aggro target into awareness.
pub(super) fn run(npc_ids: &[MobId], mobs: &mut Mobs) {
    for &npc_id in npc_ids {
        let Some(mob) = mobs.get_mut(npc_id) else {
            continue;
        };
        let in_combat = mob.in_combat;
        if let Some(npc) = mob.as_npc_mut() {
            npc.ai.awareness.in_combat = in_combat;
            npc.ai.awareness.top_aggro = npc.aggro.top();
        }
    }
}
