//! Structural graph comparison
//!
//! [`graph_eq`] compares two object graphs by shape: heap objects must map
//! one-to-one, so a graph with a shared list is not equal to one holding two
//! equal but distinct lists. Floating-point payloads compare bitwise.

use crate::value::{HeapObject, ObjRef, Value};
use rustc_hash::FxHashMap;

/// Whether two graphs are isomorphic with equal leaves
pub fn graph_eq(a: &Value, b: &Value) -> bool {
    GraphComparer::default().values(a, b)
}

#[derive(Default)]
struct GraphComparer {
    forward: FxHashMap<usize, usize>,
    backward: FxHashMap<usize, usize>,
}

impl GraphComparer {
    fn values(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Ref(x), Value::Ref(y)) => self.refs(x, y),
            (Value::Struct(x), Value::Struct(y)) => x.ty == y.ty && self.slices(&x.slots, &y.slots),
            (Value::KeyValuePair(x), Value::KeyValuePair(y)) => {
                x.key_type == y.key_type
                    && x.value_type == y.value_type
                    && self.values(&x.key, &y.key)
                    && self.values(&x.value, &y.value)
            }
            (Value::DictionaryEntry(x), Value::DictionaryEntry(y)) => {
                self.values(&x.key, &y.key) && self.values(&x.value, &y.value)
            }
            (Value::F32(x), Value::F32(y)) => x.to_bits() == y.to_bits(),
            (Value::F64(x), Value::F64(y)) => x.to_bits() == y.to_bits(),
            _ => a == b,
        }
    }

    fn refs(&mut self, x: &ObjRef, y: &ObjRef) -> bool {
        match (self.forward.get(&x.addr()), self.backward.get(&y.addr())) {
            (Some(&mapped), _) => return mapped == y.addr(),
            (None, Some(_)) => return false,
            (None, None) => {}
        }
        self.forward.insert(x.addr(), y.addr());
        self.backward.insert(y.addr(), x.addr());

        let (left, right) = (x.borrow(), y.borrow());
        match (&*left, &*right) {
            (HeapObject::Plain, HeapObject::Plain) => true,
            (HeapObject::Instance(l), HeapObject::Instance(r)) => {
                l.ty == r.ty && self.slices(&l.slots, &r.slots)
            }
            (HeapObject::Array(l), HeapObject::Array(r)) => {
                l.element == r.element
                    && l.rank == r.rank
                    && l.lengths == r.lengths
                    && l.lower_bounds == r.lower_bounds
                    && self.slices(&l.items, &r.items)
            }
            (HeapObject::Collection(l), HeapObject::Collection(r)) => {
                l.collection_type() == r.collection_type()
                    && self.slices(l.items(), r.items())
                    && l.entries().len() == r.entries().len()
                    && l
                        .entries()
                        .iter()
                        .zip(r.entries().iter())
                        .all(|((lk, lv), (rk, rv))| self.values(lk, rk) && self.values(lv, rv))
            }
            _ => false,
        }
    }

    fn slices(&mut self, a: &[Value], b: &[Value]) -> bool {
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| self.values(x, y))
    }
}
