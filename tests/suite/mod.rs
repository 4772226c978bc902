mod deferred;
mod scenarios;
mod timers;
