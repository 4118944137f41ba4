pub mod allocation;
pub mod attempt;
pub mod audit;
pub mod container;
pub mod container_allocator;
pub mod error;
pub mod headroom_provider;
pub mod node;
pub mod queue_metrics;
pub mod request_book;
pub mod reservation;
pub mod resource;
pub mod resource_calculator;
pub mod resource_request;
pub mod resource_usage;
pub mod rm_container;
pub mod scheduler_config;

pub mod default_resource_calculators {
    pub mod default_calculator;
    pub mod dominant_calculator;
}

pub mod default_container_allocators {
    pub mod regular_allocator;
}
