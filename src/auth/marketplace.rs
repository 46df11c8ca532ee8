use oso::PolarClass;

/// The marketplace as a whole. Capabilities that do not hang off a single
/// row (posting requests, bidding, topping up) are granted on it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Marketplace;

impl PolarClass for Marketplace {
    fn get_polar_class_builder() -> oso::ClassBuilder<Marketplace> {
        oso::Class::builder().name("Marketplace")
    }

    fn get_polar_class() -> oso::Class {
        Marketplace::get_polar_class_builder().build()
    }
}
