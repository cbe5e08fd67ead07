// §23.2.3 callback methods. The length is fixed at entry and every step
// re-reads its element by index.

use crate::engine::Engine;
use crate::engine::species::ConstructArgs;
use crate::engine::view::TypedView;
use crate::error::{Error, Result};
use crate::types::JsValue;

impl Engine {
    fn iteration_length(&self, view: &TypedView) -> Result<usize> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        Ok(view.length())
    }

    /// `%TypedArray%.prototype.forEach`
    pub fn for_each(
        &self,
        view: &TypedView,
        mut callback: impl FnMut(&JsValue, usize) -> Result<()>,
    ) -> Result<()> {
        let len = self.iteration_length(view)?;
        for k in 0..len {
            let value = self.element_value(view, k)?;
            callback(&value, k)?;
        }
        Ok(())
    }

    /// `%TypedArray%.prototype.every`
    pub fn every(
        &self,
        view: &TypedView,
        mut predicate: impl FnMut(&JsValue, usize) -> Result<bool>,
    ) -> Result<bool> {
        let len = self.iteration_length(view)?;
        for k in 0..len {
            let value = self.element_value(view, k)?;
            if !predicate(&value, k)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `%TypedArray%.prototype.some`
    pub fn some(
        &self,
        view: &TypedView,
        mut predicate: impl FnMut(&JsValue, usize) -> Result<bool>,
    ) -> Result<bool> {
        let len = self.iteration_length(view)?;
        for k in 0..len {
            let value = self.element_value(view, k)?;
            if predicate(&value, k)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn find_from(
        &self,
        view: &TypedView,
        reverse: bool,
        mut predicate: impl FnMut(&JsValue, usize) -> Result<bool>,
    ) -> Result<Option<(usize, JsValue)>> {
        let len = self.iteration_length(view)?;
        let mut visit = |k: usize| -> Result<Option<(usize, JsValue)>> {
            let value = self.element_value(view, k)?;
            Ok(predicate(&value, k)?.then_some((k, value)))
        };
        if reverse {
            for k in (0..len).rev() {
                if let Some(hit) = visit(k)? {
                    return Ok(Some(hit));
                }
            }
        } else {
            for k in 0..len {
                if let Some(hit) = visit(k)? {
                    return Ok(Some(hit));
                }
            }
        }
        Ok(None)
    }

    /// `%TypedArray%.prototype.find`
    pub fn find(
        &self,
        view: &TypedView,
        predicate: impl FnMut(&JsValue, usize) -> Result<bool>,
    ) -> Result<Option<JsValue>> {
        Ok(self.find_from(view, false, predicate)?.map(|(_, v)| v))
    }

    /// `%TypedArray%.prototype.findIndex`
    pub fn find_index(
        &self,
        view: &TypedView,
        predicate: impl FnMut(&JsValue, usize) -> Result<bool>,
    ) -> Result<Option<usize>> {
        Ok(self.find_from(view, false, predicate)?.map(|(k, _)| k))
    }

    /// `%TypedArray%.prototype.findLast`
    pub fn find_last(
        &self,
        view: &TypedView,
        predicate: impl FnMut(&JsValue, usize) -> Result<bool>,
    ) -> Result<Option<JsValue>> {
        Ok(self.find_from(view, true, predicate)?.map(|(_, v)| v))
    }

    /// `%TypedArray%.prototype.findLastIndex`
    pub fn find_last_index(
        &self,
        view: &TypedView,
        predicate: impl FnMut(&JsValue, usize) -> Result<bool>,
    ) -> Result<Option<usize>> {
        Ok(self.find_from(view, true, predicate)?.map(|(k, _)| k))
    }

    /// `%TypedArray%.prototype.map`: the result comes from the species
    /// constructor.
    pub fn map(
        &self,
        view: &TypedView,
        mut mapper: impl FnMut(&JsValue, usize) -> Result<JsValue>,
    ) -> Result<TypedView> {
        let len = self.iteration_length(view)?;
        let result = self.species_create(view, ConstructArgs::Length(len))?;
        for k in 0..len {
            let value = self.element_value(view, k)?;
            let mapped = mapper(&value, k)?;
            self.store_element(&result, k, &mapped)?;
        }
        Ok(result)
    }

    /// `%TypedArray%.prototype.filter`
    pub fn filter(
        &self,
        view: &TypedView,
        mut predicate: impl FnMut(&JsValue, usize) -> Result<bool>,
    ) -> Result<TypedView> {
        let len = self.iteration_length(view)?;
        let mut kept = Vec::new();
        for k in 0..len {
            let value = self.element_value(view, k)?;
            if predicate(&value, k)? {
                kept.push(value);
            }
        }
        let result = self.species_create(view, ConstructArgs::Length(kept.len()))?;
        for (n, value) in kept.iter().enumerate() {
            self.store_element(&result, n, value)?;
        }
        Ok(result)
    }

    /// `%TypedArray%.prototype.reduce`
    pub fn reduce(
        &self,
        view: &TypedView,
        reducer: impl FnMut(JsValue, &JsValue, usize) -> Result<JsValue>,
        initial: Option<JsValue>,
    ) -> Result<JsValue> {
        let len = self.iteration_length(view)?;
        self.fold(view, 0..len, reducer, initial)
    }

    /// `%TypedArray%.prototype.reduceRight`
    pub fn reduce_right(
        &self,
        view: &TypedView,
        reducer: impl FnMut(JsValue, &JsValue, usize) -> Result<JsValue>,
        initial: Option<JsValue>,
    ) -> Result<JsValue> {
        let len = self.iteration_length(view)?;
        self.fold(view, (0..len).rev(), reducer, initial)
    }

    fn fold(
        &self,
        view: &TypedView,
        mut indices: impl Iterator<Item = usize>,
        mut reducer: impl FnMut(JsValue, &JsValue, usize) -> Result<JsValue>,
        initial: Option<JsValue>,
    ) -> Result<JsValue> {
        let mut acc = match initial {
            Some(v) => v,
            None => match indices.next() {
                Some(k) => self.element_value(view, k)?,
                None => {
                    return Err(Error::type_error("reduce of empty array with no initial value"));
                }
            },
        };
        for k in indices {
            let value = self.element_value(view, k)?;
            acc = reducer(acc, &value, k)?;
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::engine::codec::ElementKind;
    use crate::engine::species::{ConstructArgs, DefaultConstructor, Object, ViewConstructor};
    use crate::engine::view::TypedView;
    use crate::error::{Error, Result};
    use crate::types::{JsValue, Numeric};
    use std::sync::Arc;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default())
    }

    fn view(e: &Engine, kind: ElementKind, values: &[f64]) -> TypedView {
        let values: Vec<JsValue> = values.iter().map(|&n| JsValue::Number(n)).collect();
        e.view_of(kind, &values).unwrap()
    }

    fn number(v: &JsValue) -> f64 {
        match v {
            JsValue::Number(n) => *n,
            _ => f64::NAN,
        }
    }

    fn contents(v: &TypedView) -> Vec<f64> {
        v.snapshot().unwrap().iter().map(|n| n.as_f64().unwrap()).collect()
    }

    #[test]
    fn for_each_visits_in_order() {
        let e = engine();
        let v = view(&e, ElementKind::Int8, &[5.0, -6.0, 7.0]);
        let mut seen = Vec::new();
        e.for_each(&v, |value, k| {
            seen.push((k, number(value)));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(0, 5.0), (1, -6.0), (2, 7.0)]);
    }

    #[test]
    fn callback_errors_propagate() {
        let e = engine();
        let v = view(&e, ElementKind::Int8, &[1.0, 2.0]);
        let mut calls = 0;
        let err = e
            .for_each(&v, |_, _| {
                calls += 1;
                Err(Error::type_error("stop"))
            })
            .unwrap_err();
        assert!(err.is_type_error());
        assert_eq!(calls, 1);
    }

    #[test]
    fn every_and_some_short_circuit() {
        let e = engine();
        let v = view(&e, ElementKind::Uint16, &[2.0, 4.0, 5.0, 6.0]);
        let mut visited = 0;
        assert!(!e
            .every(&v, |value, _| {
                visited += 1;
                Ok(number(value) % 2.0 == 0.0)
            })
            .unwrap());
        assert_eq!(visited, 3);
        assert!(e.some(&v, |value, _| Ok(number(value) > 5.0)).unwrap());
        assert!(!e.some(&v, |value, _| Ok(number(value) > 6.0)).unwrap());

        let empty = e.create_view(ElementKind::Uint16, 0).unwrap();
        assert!(e.every(&empty, |_, _| Ok(false)).unwrap());
    }

    #[test]
    fn find_family() {
        let e = engine();
        let v = view(&e, ElementKind::Float32, &[1.0, 2.5, 3.0, 2.5]);
        let is_fraction = |value: &JsValue, _: usize| -> Result<bool> { Ok(number(value).fract() != 0.0) };
        assert_eq!(e.find(&v, is_fraction).unwrap(), Some(JsValue::Number(2.5)));
        assert_eq!(e.find_index(&v, is_fraction).unwrap(), Some(1));
        assert_eq!(e.find_last(&v, is_fraction).unwrap(), Some(JsValue::Number(2.5)));
        assert_eq!(e.find_last_index(&v, is_fraction).unwrap(), Some(3));
        assert_eq!(e.find_index(&v, |value, _| Ok(number(value) > 10.0)).unwrap(), None);
        assert_eq!(e.find(&v, |value, _| Ok(number(value) > 10.0)).unwrap(), None);
    }

    #[test]
    fn detaching_callback_yields_undefined() {
        let e = engine();
        let v = view(&e, ElementKind::Uint8, &[1.0, 2.0, 3.0]);
        let store = v.buffer().clone();
        let mut seen = Vec::new();
        e.for_each(&v, |value, _| {
            seen.push(value.clone());
            store.detach();
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![JsValue::Number(1.0), JsValue::Undefined, JsValue::Undefined]);
    }

    #[test]
    fn callbacks_observe_writes() {
        let e = engine();
        let v = view(&e, ElementKind::Int32, &[1.0, 2.0, 3.0]);
        let alias = v.clone();
        let engine_ref = &e;
        let mut seen = Vec::new();
        e.for_each(&v, |value, k| {
            seen.push(number(value));
            if k == 0 {
                engine_ref.set_index(&alias, 2, &JsValue::Number(30.0))?;
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![1.0, 2.0, 30.0]);
    }

    #[test]
    fn map_uses_species() {
        let e = engine();
        let v = view(&e, ElementKind::Int16, &[1.0, -2.0, 3.0]);
        let doubled = e.map(&v, |value, _| Ok(JsValue::Number(number(value) * 2.0))).unwrap();
        assert_eq!(doubled.kind(), ElementKind::Int16);
        assert_eq!(contents(&doubled), vec![2.0, -4.0, 6.0]);

        let ctor: Arc<dyn ViewConstructor> = Arc::new(|e: &Engine, args: ConstructArgs| -> Result<Object> {
            DefaultConstructor(ElementKind::Uint8).construct(e, args)
        });
        let v = v.with_species(ctor);
        let mapped = e.map(&v, |value, _| Ok(JsValue::Number(number(value)))).unwrap();
        assert_eq!(mapped.kind(), ElementKind::Uint8);
        assert_eq!(contents(&mapped), vec![1.0, 254.0, 3.0]);
    }

    #[test]
    fn map_coerces_results() {
        let e = engine();
        let v = e.view_of(ElementKind::BigInt64, &[JsValue::bigint(2)]).unwrap();
        let err = e.map(&v, |_, _| Ok(JsValue::Number(1.0))).unwrap_err();
        assert!(err.is_type_error());
        let ok = e.map(&v, |_, _| Ok(JsValue::string("12"))).unwrap();
        assert_eq!(ok.snapshot().unwrap()[0].clone().into_value(), JsValue::bigint(12));
    }

    #[test]
    fn filter_sizes_the_result() {
        let e = engine();
        let v = view(&e, ElementKind::Float64, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let odd = e.filter(&v, |value, _| Ok(number(value) % 2.0 == 1.0)).unwrap();
        assert_eq!(contents(&odd), vec![1.0, 3.0, 5.0]);
        let none = e.filter(&v, |_, _| Ok(false)).unwrap();
        assert_eq!(none.length(), 0);
    }

    #[test]
    fn filter_rejects_short_species_results() {
        let e = engine();
        let ctor: Arc<dyn ViewConstructor> = Arc::new(|e: &Engine, _: ConstructArgs| -> Result<Object> {
            DefaultConstructor(ElementKind::Uint8).construct(e, ConstructArgs::Length(0))
        });
        let v = view(&e, ElementKind::Uint8, &[1.0, 2.0]).with_species(ctor);
        assert!(e.filter(&v, |_, _| Ok(true)).unwrap_err().is_range_error());
    }

    #[test]
    fn reductions() {
        let e = engine();
        let v = view(&e, ElementKind::Uint8, &[1.0, 2.0, 3.0]);
        let sum = e
            .reduce(&v, |acc, value, _| Ok(JsValue::Number(number(&acc) + number(value))), None)
            .unwrap();
        assert_eq!(sum, JsValue::Number(6.0));

        let digits = e
            .reduce_right(
                &v,
                |acc, value, _| Ok(JsValue::Number(number(&acc) * 10.0 + number(value))),
                Some(JsValue::Number(0.0)),
            )
            .unwrap();
        assert_eq!(digits, JsValue::Number(321.0));

        let empty = e.create_view(ElementKind::Uint8, 0).unwrap();
        assert!(e.reduce(&empty, |acc, _, _| Ok(acc), None).unwrap_err().is_type_error());
        assert_eq!(
            e.reduce_right(&empty, |acc, _, _| Ok(acc), Some(JsValue::Null)).unwrap(),
            JsValue::Null
        );
    }

    #[test]
    fn detached_receivers_are_rejected() {
        let e = engine();
        let v = view(&e, ElementKind::Uint8, &[1.0]);
        v.buffer().detach();
        assert!(e.for_each(&v, |_, _| Ok(())).unwrap_err().is_type_error());
        assert!(e.map(&v, |v, _| Ok(v.clone())).unwrap_err().is_type_error());
        assert!(e.reduce(&v, |acc, _, _| Ok(acc), Some(JsValue::Null)).unwrap_err().is_type_error());
    }

    #[test]
    fn shared_callbacks_may_write_back() {
        let e = engine();
        let store = e.allocate_shared(3).unwrap();
        let v = e.view_over(&store, ElementKind::Uint8, 0, None).unwrap();
        let alias = v.clone();
        let engine_ref = &e;
        e.for_each(&v, |value, k| {
            engine_ref.set_index(&alias, k, &JsValue::Number(number(value) + 1.0))
        })
        .unwrap();
        assert_eq!(v.snapshot().unwrap(), vec![Numeric::Int(1); 3]);
    }
}
