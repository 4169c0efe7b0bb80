mod failover_test;
mod relay_test;
