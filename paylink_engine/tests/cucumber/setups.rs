use std::time::Duration;

use cucumber::given;
use paylink_engine::plg_api::reminder_objects::ReminderConfig;

use crate::{cucumber::PaylinkWorld, support::TestSystem};

#[given("a fresh install")]
async fn fresh_install(world: &mut PaylinkWorld) {
    world.system = Some(TestSystem::new().await);
}

#[given("a fresh install where reminders are due immediately")]
async fn fresh_install_immediate_reminders(world: &mut PaylinkWorld) {
    let config = ReminderConfig { delays: vec![Duration::ZERO; 3], ..ReminderConfig::default() };
    world.system = Some(TestSystem::with_reminder_config(config).await);
}
