mod helpers;
mod links;
mod mocks;
mod orders;
mod reminders;
mod webhooks;
