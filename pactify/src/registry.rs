use crate::error::Error;
use crate::interaction::Interaction;

/// Ordered collection of the interactions registered for one scenario.
/// Registration order is preserved; candidate lookup prefers the most
/// recently registered interaction so later registrations override earlier
/// ones with the same method and path.
#[derive(Debug, Default)]
pub struct InteractionRegistry {
    interactions: Vec<Interaction>,
}

impl InteractionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, interaction: Interaction) -> Result<(), Error> {
        interaction.validate()?;
        self.interactions.push(interaction);
        Ok(())
    }

    /// Pre-filter on method and path pattern only; header and body matching
    /// happens per candidate in the mock server. Most recently registered
    /// first.
    pub fn find_candidates(&self, method: &str, path: &str) -> Vec<(usize, &Interaction)> {
        self.interactions
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, interaction)| {
                interaction.method().eq_ignore_ascii_case(method)
                    && interaction.path().matches(path)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.interactions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Interaction> {
        self.interactions.clone()
    }
}
