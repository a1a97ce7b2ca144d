use bevy_ecs::resource::Resource;
use bevy_ecs::system::ResMut;

/// Simulation clock resource tracking the current day.
///
/// Advances by one day per tick. The `advance_day` system moves the clock
/// forward at the end of each tick (in `SimPhase::Last`), so systems see the
/// current day before it advances.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct DayClock {
    pub day: u32,
}

impl DayClock {
    pub fn new() -> Self {
        Self { day: 0 }
    }

    pub fn advance(&mut self) {
        self.day += 1;
    }
}

/// Bevy system that advances the clock by one simulated day.
pub fn advance_day(mut clock: ResMut<DayClock>) {
    clock.advance();
}
