//! Walking the parameters of a model with their field paths.

use std::sync::Arc;

use crate::param::Param;

pub type VisitParamsFn<'a> = dyn FnMut(&str, &Arc<Param>) + 'a;

/// Callback wrapper that tracks the dotted path of the field being visited.
///
/// Containers open a scope per field, index or key with
/// [`scoped`](Self::scoped); leaves report themselves with
/// [`param`](Self::param).
pub struct ParamVisitor<'a> {
    segments: Vec<String>,
    scratch: String,
    f: &'a mut VisitParamsFn<'a>,
}

impl<'a> ParamVisitor<'a> {
    pub fn new(f: &'a mut VisitParamsFn<'a>) -> Self {
        Self {
            segments: Vec::new(),
            scratch: String::new(),
            f,
        }
    }

    pub fn scoped(&mut self, segment: &str, inner: impl FnOnce(&mut Self)) {
        self.segments.push(segment.to_string());
        inner(self);
        self.segments.pop();
    }

    /// Report `param` at the current path.
    pub fn param(&mut self, param: &Arc<Param>) {
        self.scratch.clear();
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                self.scratch.push('.');
            }
            self.scratch.push_str(seg);
        }
        (self.f)(self.scratch.as_str(), param);
    }

    /// Dotted path of the current scope.
    pub fn path(&self) -> String {
        self.segments.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_nest_and_unwind() {
        let p = Arc::new(Param::scalar(0.0));
        let mut seen = Vec::new();
        {
            let mut f = |path: &str, _: &Arc<Param>| seen.push(path.to_string());
            let mut v = ParamVisitor::new(&mut f);
            v.param(&p);
            v.scoped("encoder", |v| {
                v.scoped("0", |v| v.param(&p));
                assert_eq!(v.path(), "encoder");
            });
            v.scoped("bias", |v| v.param(&p));
        }
        assert_eq!(seen, ["", "encoder.0", "bias"]);
    }
}
