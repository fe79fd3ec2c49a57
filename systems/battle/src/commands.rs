use crystal_defence_core::{
    Command, CommandAction, DamageType, EntityId, EntityKind, GameEvent, Position, StatKey,
};
use crystal_defence_damage::DamageOptions;
use crystal_defence_skills::CastFailure;
use thiserror::Error;

use crate::factory;
use crate::simulation::BattleSimulation;

/// Mana restored by an ether.
const ETHER_MANA: f64 = 50.0;
/// Share of max health restored by a potion.
const POTION_HEAL_RATIO: f64 = 0.3;
/// Attack granted by a whetstone.
const WHETSTONE_ATTACK: f64 = 10.0;

/// Consumables a hero can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Item {
    Potion,
    Ether,
    Elixir,
    Whetstone,
}

impl Item {
    fn parse(item_id: &str) -> Option<Self> {
        match item_id {
            "potion" => Some(Self::Potion),
            "ether" => Some(Self::Ether),
            "elixir" => Some(Self::Elixir),
            "whetstone" => Some(Self::Whetstone),
            _ => None,
        }
    }
}

/// Why a command was rejected.
#[derive(Clone, Debug, PartialEq, Error)]
pub(crate) enum CommandError {
    #[error("player has no living hero")]
    NoHero,
    #[error(transparent)]
    Cast(#[from] CastFailure),
    #[error("skill `{0}` is not in the skill book")]
    UnknownSkill(String),
    #[error("skill `{0}` is already at its maximum level")]
    MaxLevel(String),
    #[error("slot {0} does not exist")]
    InvalidSlot(u8),
    #[error("hero does not carry `{0}`")]
    MissingItem(String),
    #[error("item `{0}` has no effect")]
    UnknownItem(String),
    #[error("{0} is not a living enemy")]
    InvalidTarget(EntityId),
}

impl BattleSimulation {
    /// Runs one command on behalf of its player's hero.
    pub(crate) fn execute(&mut self, command: &Command) -> Result<(), CommandError> {
        let hero = self
            .entities
            .hero_of(command.player)
            .filter(|id| self.entities.is_alive(*id))
            .ok_or(CommandError::NoHero)?;

        match &command.action {
            CommandAction::CastSkill {
                skill_id,
                target,
                position,
            } => {
                let (mut ctx, damage, skills) = self.parts();
                let _ = skills.cast_skill(&mut ctx, damage, hero, skill_id, *target, *position)?;
                Ok(())
            }
            CommandAction::LearnSkill { skill_id } => self.learn_skill(hero, skill_id),
            CommandAction::ChangePosition { slot } => self.change_position(hero, *slot),
            CommandAction::UseItem { item_id } => self.use_item(hero, item_id),
            CommandAction::Attack {
                target,
                set_as_target,
            } => self.attack(hero, *target, *set_as_target),
        }
    }

    fn learn_skill(&mut self, hero: EntityId, skill_id: &str) -> Result<(), CommandError> {
        let config = self
            .skill_book
            .get(skill_id)
            .ok_or_else(|| CommandError::UnknownSkill(skill_id.to_owned()))?;
        self.skills
            .learn(&mut self.events, hero, config)
            .map(|_| ())
            .ok_or_else(|| CommandError::MaxLevel(skill_id.to_owned()))
    }

    fn change_position(&mut self, hero: EntityId, slot: u8) -> Result<(), CommandError> {
        if !(1..=factory::HERO_SLOTS).contains(&slot) {
            return Err(CommandError::InvalidSlot(slot));
        }
        let center = self
            .crystal
            .and_then(|id| self.entities.get(id))
            .map_or(Position::ZERO, |crystal| crystal.position());
        let position = factory::slot_position(center, slot, self.settings.hero_slot_radius);

        let _ = self.entities.set_position(hero, position);
        if let Some(role) = self.entities.get_mut(hero).and_then(|entity| entity.hero_mut()) {
            role.set_slot(slot);
        }
        self.events.emit(GameEvent::HeroPositionChanged {
            hero,
            slot,
            position,
        });
        Ok(())
    }

    fn use_item(&mut self, hero: EntityId, item_id: &str) -> Result<(), CommandError> {
        let item =
            Item::parse(item_id).ok_or_else(|| CommandError::UnknownItem(item_id.to_owned()))?;
        let entity = self.entities.get_mut(hero).ok_or(CommandError::NoHero)?;
        let taken = entity
            .hero_mut()
            .is_some_and(|role| role.take_item(item_id));
        if !taken {
            return Err(CommandError::MissingItem(item_id.to_owned()));
        }

        match item {
            Item::Potion => {
                let amount = entity.max_hp() * POTION_HEAL_RATIO;
                let (mut ctx, damage, _) = self.parts();
                let _ = damage.apply_healing(&mut ctx, Some(hero), hero, amount, 0.0, 1.0);
            }
            Item::Ether => restore_mana(entity, ETHER_MANA),
            Item::Elixir => {
                let missing = entity.max_hp() - entity.hp();
                let max_mp = entity.stat(&StatKey::MaxMp);
                restore_mana(entity, max_mp);
                let (mut ctx, damage, _) = self.parts();
                let _ = damage.apply_healing(&mut ctx, Some(hero), hero, missing, 0.0, 1.0);
            }
            Item::Whetstone => {
                let _ = entity.add_to_stat(StatKey::Attack, WHETSTONE_ATTACK);
            }
        }

        self.events.emit(GameEvent::ItemUsed {
            hero,
            item_id: item_id.to_owned(),
        });
        Ok(())
    }

    fn attack(
        &mut self,
        hero: EntityId,
        target: EntityId,
        set_as_target: bool,
    ) -> Result<(), CommandError> {
        let target_position = self
            .entities
            .get(target)
            .filter(|entity| entity.kind() == EntityKind::Bean && entity.is_alive())
            .map(|entity| entity.position())
            .ok_or(CommandError::InvalidTarget(target))?;

        let now = self.now;
        let entity = self.entities.get_mut(hero).ok_or(CommandError::NoHero)?;
        let origin = entity.position();
        let amount = entity.stat(&StatKey::Attack);
        let role = entity.hero_mut().ok_or(CommandError::NoHero)?;
        let changed = role.set_target(Some(target));
        let strike = !set_as_target
            && role.ready_to_attack(now)
            && origin.distance(target_position) <= role.attack_range();
        if strike {
            role.record_attack(now);
        }

        if changed {
            self.events.emit(GameEvent::HeroTargetChanged {
                hero,
                target: Some(target),
            });
        }
        if strike {
            let (mut ctx, damage, _) = self.parts();
            let _ = damage.apply_damage(
                &mut ctx,
                Some(hero),
                target,
                amount,
                DamageType::Physical,
                &DamageOptions::default(),
            );
        }
        Ok(())
    }
}

fn restore_mana(entity: &mut crystal_defence_world::Entity, amount: f64) {
    let headroom = (entity.stat(&StatKey::MaxMp) - entity.stat(&StatKey::Mp)).max(0.0);
    let _ = entity.add_to_stat(StatKey::Mp, amount.min(headroom));
}
