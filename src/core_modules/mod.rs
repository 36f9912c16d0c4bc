pub mod blob_detector;
pub mod dispatcher;
pub mod events;
pub mod frame;
pub mod mask;
pub mod observation;
pub mod pixel;
pub mod planner;
pub mod tracker;
