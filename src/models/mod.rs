pub mod editing;
pub mod itinerary;
pub mod trip;
