pub mod determine_ecs_subnet;
pub mod forward_query;

pub use determine_ecs_subnet::DetermineEcsSubnetUseCase;
pub use forward_query::ForwardQueryUseCase;
