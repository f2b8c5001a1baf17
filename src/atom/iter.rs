use crate::Atom;

/// Depth-first, pre-order iterator over an atom tree.
pub struct AtomIter<'a> {
    stack: Vec<&'a Atom>,
}

impl<'a> AtomIter<'a> {
    pub(crate) fn new(root: &'a Atom) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for AtomIter<'a> {
    type Item = &'a Atom;

    fn next(&mut self) -> Option<Self::Item> {
        let atom = self.stack.pop()?;
        // Children are pushed in reverse so they pop in document order.
        self.stack.extend(atom.children().iter().rev());
        Some(atom)
    }
}
