mod commands;
mod incoming;
mod swarm;
