/// Handle returned when a listener is added; pass it back to remove it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Subscription(pub u64);

/// Ordered listener registry. Listeners are called in registration order.
pub struct Listeners<F: ?Sized> {
    next_id: u64,
    entries: Vec<(Subscription, Box<F>)>,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> std::fmt::Debug for Listeners<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<F: ?Sized> Listeners<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Box<F>) -> Subscription {
        let sub = Subscription(self.next_id);
        self.next_id += 1;
        self.entries.push((sub, listener));
        sub
    }

    pub fn remove(&mut self, sub: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(s, _)| *s != sub);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<F>> {
        self.entries.iter_mut().map(|(_, l)| l)
    }
}
