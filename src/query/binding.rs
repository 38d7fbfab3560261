//! Into and use bindings.
//!
//! A binding ties application storage to one backend binder. Into targets
//! are borrowed through `RefCell` so the application can read them between
//! fetches while the statement still holds the binding.

use crate::backend::{
    StandardIntoBackend, StandardUseBackend, StatementBackend, VectorIntoBackend,
    VectorUseBackend,
};
use crate::error::{BridgeError, QueryError};
use crate::exchange::{Blob, Exchange, ExchangeType, Indicator, IntoData, UseData};
use crate::query::Row;
use std::cell::{Cell, RefCell, RefMut};

/// Output binding created by [`into_value`], [`into_vec`] or [`into_row`].
pub struct IntoBinding<'a> {
    pub(crate) kind: IntoKind<'a>,
    exchange_type: Option<ExchangeType>,
}

pub(crate) enum IntoKind<'a> {
    Element(Box<dyn IntoElement + 'a>),
    Row(&'a RefCell<Row>),
}

impl IntoBinding<'_> {
    /// Exchange type of the target. `None` for dynamic rows.
    pub fn exchange_type(&self) -> Option<ExchangeType> {
        self.exchange_type
    }
}

/// Input binding created by [`use_value`] or [`use_vec`].
pub struct UseBinding<'a> {
    pub(crate) element: Box<dyn UseElement + 'a>,
    exchange_type: ExchangeType,
}

impl UseBinding<'_> {
    /// Bind to the `:name` parameter instead of the next position.
    pub fn named(mut self, name: &str) -> Self {
        self.element.set_name(name);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.element.name()
    }

    pub fn exchange_type(&self) -> ExchangeType {
        self.exchange_type
    }
}

/// Any binding accepted by [`Statement::exchange`](crate::query::Statement::exchange).
pub enum Binding<'a> {
    Into(IntoBinding<'a>),
    Use(UseBinding<'a>),
}

impl<'a> From<IntoBinding<'a>> for Binding<'a> {
    fn from(binding: IntoBinding<'a>) -> Self {
        Binding::Into(binding)
    }
}

impl<'a> From<UseBinding<'a>> for Binding<'a> {
    fn from(binding: UseBinding<'a>) -> Self {
        Binding::Use(binding)
    }
}

/// Fetch into a single value. A NULL fetched here is an error.
pub fn into_value<T: Exchange>(target: &RefCell<T>) -> IntoBinding<'_> {
    IntoBinding {
        kind: IntoKind::Element(Box::new(ScalarInto {
            target,
            indicator: None,
            backend: None,
        })),
        exchange_type: Some(T::EXCHANGE_TYPE),
    }
}

/// Fetch into a single value with an indicator.
pub fn into_value_ind<'a, T: Exchange>(
    target: &'a RefCell<T>,
    indicator: &'a Cell<Indicator>,
) -> IntoBinding<'a> {
    IntoBinding {
        kind: IntoKind::Element(Box::new(ScalarInto {
            target,
            indicator: Some(indicator),
            backend: None,
        })),
        exchange_type: Some(T::EXCHANGE_TYPE),
    }
}

/// Fetch up to `target.len()` rows per call. The vector is shortened to the
/// rows actually read.
pub fn into_vec<T: Exchange>(target: &RefCell<Vec<T>>) -> IntoBinding<'_> {
    IntoBinding {
        kind: IntoKind::Element(Box::new(VectorInto {
            target,
            indicators: None,
            backend: None,
        })),
        exchange_type: Some(T::EXCHANGE_TYPE),
    }
}

/// Fetch rows with one indicator per row. Both vectors must have the same
/// length.
pub fn into_vec_ind<'a, T: Exchange>(
    target: &'a RefCell<Vec<T>>,
    indicators: &'a RefCell<Vec<Indicator>>,
) -> IntoBinding<'a> {
    IntoBinding {
        kind: IntoKind::Element(Box::new(VectorInto {
            target,
            indicators: Some(indicators),
            backend: None,
        })),
        exchange_type: Some(T::EXCHANGE_TYPE),
    }
}

/// Fetch into a dynamically described row.
pub fn into_row(row: &RefCell<Row>) -> IntoBinding<'_> {
    IntoBinding {
        kind: IntoKind::Row(row),
        exchange_type: None,
    }
}

/// Use a single value.
pub fn use_value<T: Exchange>(value: &T) -> UseBinding<'_> {
    UseBinding {
        element: Box::new(ScalarUse {
            value,
            indicator: None,
            name: None,
            backend: None,
        }),
        exchange_type: T::EXCHANGE_TYPE,
    }
}

/// Use a single value with an indicator; `Indicator::Null` sends NULL.
pub fn use_value_ind<'a, T: Exchange>(
    value: &'a T,
    indicator: &'a Cell<Indicator>,
) -> UseBinding<'a> {
    UseBinding {
        element: Box::new(ScalarUse {
            value,
            indicator: Some(indicator),
            name: None,
            backend: None,
        }),
        exchange_type: T::EXCHANGE_TYPE,
    }
}

/// Use a column of values; the statement runs once per element.
pub fn use_vec<T: Exchange>(values: &[T]) -> UseBinding<'_> {
    UseBinding {
        element: Box::new(VectorUse {
            values,
            indicators: None,
            name: None,
            backend: None,
        }),
        exchange_type: T::EXCHANGE_TYPE,
    }
}

/// Use a column of values with one indicator per element.
pub fn use_vec_ind<'a, T: Exchange>(
    values: &'a [T],
    indicators: &'a [Indicator],
) -> UseBinding<'a> {
    UseBinding {
        element: Box::new(VectorUse {
            values,
            indicators: Some(indicators),
            name: None,
            backend: None,
        }),
        exchange_type: T::EXCHANGE_TYPE,
    }
}

/// Engine-side view of an output binding.
pub(crate) trait IntoElement {
    /// Rows this binding can receive per fetch.
    fn size(&self) -> Result<usize, BridgeError>;

    fn define(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), BridgeError>;

    fn pre_fetch(&mut self) -> Result<(), BridgeError>;

    fn post_fetch(&mut self, got_data: bool, called_from_fetch: bool) -> Result<(), BridgeError>;

    /// Shrink to `rows` entries. Scalars ignore this.
    fn resize(&mut self, rows: usize) -> Result<(), BridgeError>;

    fn clean_up(&mut self);
}

/// Engine-side view of an input binding.
pub(crate) trait UseElement {
    fn name(&self) -> Option<&str>;

    fn set_name(&mut self, name: &str);

    /// Rows this binding supplies per execution.
    fn size(&self) -> usize;

    fn bind(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), BridgeError>;

    fn pre_use(&mut self) -> Result<(), BridgeError>;

    fn post_use(&mut self, got_data: bool) -> Result<(), BridgeError>;

    fn clean_up(&mut self);
}

fn not_defined() -> BridgeError {
    QueryError::InvalidState("binding has not been defined".to_string()).into()
}

fn borrow_target<T: ?Sized>(cell: &RefCell<T>) -> Result<RefMut<'_, T>, BridgeError> {
    cell.try_borrow_mut().map_err(|_| {
        QueryError::InvalidState("bound storage is borrowed elsewhere".to_string()).into()
    })
}

struct ScalarInto<'a, T> {
    target: &'a RefCell<T>,
    indicator: Option<&'a Cell<Indicator>>,
    backend: Option<Box<dyn StandardIntoBackend>>,
}

impl<T: Exchange> IntoElement for ScalarInto<'_, T> {
    fn size(&self) -> Result<usize, BridgeError> {
        Ok(1)
    }

    fn define(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), BridgeError> {
        let mut binder = backend.make_into_backend()?;
        binder.define_by_pos(position, T::EXCHANGE_TYPE)?;
        self.backend = Some(binder);
        Ok(())
    }

    fn pre_fetch(&mut self) -> Result<(), BridgeError> {
        self.backend.as_mut().ok_or_else(not_defined)?.pre_fetch()
    }

    fn post_fetch(&mut self, got_data: bool, called_from_fetch: bool) -> Result<(), BridgeError> {
        let binder = self.backend.as_mut().ok_or_else(not_defined)?;
        let mut target = borrow_target(self.target)?;
        let mut indicator = self.indicator.map(Cell::get);
        binder.post_fetch(
            got_data,
            called_from_fetch,
            target.into_data(),
            indicator.as_mut(),
        )?;
        if let (Some(cell), Some(value)) = (self.indicator, indicator) {
            cell.set(value);
        }
        Ok(())
    }

    fn resize(&mut self, _rows: usize) -> Result<(), BridgeError> {
        Ok(())
    }

    fn clean_up(&mut self) {
        if let Some(mut binder) = self.backend.take() {
            binder.clean_up();
        }
    }
}

struct VectorInto<'a, T> {
    target: &'a RefCell<Vec<T>>,
    indicators: Option<&'a RefCell<Vec<Indicator>>>,
    backend: Option<Box<dyn VectorIntoBackend>>,
}

impl<T> VectorInto<'_, T> {
    fn check_indicators(&self, values: usize) -> Result<(), BridgeError> {
        if let Some(indicators) = self.indicators {
            let len = borrow_target(indicators)?.len();
            if len != values {
                return Err(QueryError::IndicatorSizeMismatch {
                    values,
                    indicators: len,
                }
                .into());
            }
        }
        Ok(())
    }
}

impl<T: Exchange> IntoElement for VectorInto<'_, T> {
    fn size(&self) -> Result<usize, BridgeError> {
        Ok(borrow_target(self.target)?.len())
    }

    fn define(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), BridgeError> {
        let mut binder = backend.make_vector_into_backend()?;
        binder.define_by_pos(position, T::EXCHANGE_TYPE)?;
        self.backend = Some(binder);
        Ok(())
    }

    fn pre_fetch(&mut self) -> Result<(), BridgeError> {
        self.check_indicators(self.size()?)?;
        self.backend.as_mut().ok_or_else(not_defined)?.pre_fetch()
    }

    fn post_fetch(&mut self, got_data: bool, _called_from_fetch: bool) -> Result<(), BridgeError> {
        let binder = self.backend.as_mut().ok_or_else(not_defined)?;
        let mut values = borrow_target(self.target)?;
        let mut indicators = match self.indicators {
            Some(cell) => Some(borrow_target(cell)?),
            None => None,
        };
        if let Some(indicators) = &indicators {
            if indicators.len() != values.len() {
                return Err(QueryError::IndicatorSizeMismatch {
                    values: values.len(),
                    indicators: indicators.len(),
                }
                .into());
            }
        }
        let mut targets: Vec<IntoData<'_>> = values.iter_mut().map(Exchange::into_data).collect();
        binder.post_fetch(
            got_data,
            &mut targets,
            indicators.as_deref_mut().map(Vec::as_mut_slice),
        )
    }

    fn resize(&mut self, rows: usize) -> Result<(), BridgeError> {
        borrow_target(self.target)?.truncate(rows);
        if let Some(indicators) = self.indicators {
            borrow_target(indicators)?.truncate(rows);
        }
        Ok(())
    }

    fn clean_up(&mut self) {
        if let Some(mut binder) = self.backend.take() {
            binder.clean_up();
        }
    }
}

struct ScalarUse<'a, T> {
    value: &'a T,
    indicator: Option<&'a Cell<Indicator>>,
    name: Option<String>,
    backend: Option<Box<dyn StandardUseBackend>>,
}

impl<T: Exchange> UseElement for ScalarUse<'_, T> {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    fn size(&self) -> usize {
        1
    }

    fn bind(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), BridgeError> {
        let mut binder = backend.make_use_backend()?;
        match &self.name {
            Some(name) => binder.bind_by_name(name, T::EXCHANGE_TYPE)?,
            None => binder.bind_by_pos(position, T::EXCHANGE_TYPE)?,
        }
        self.backend = Some(binder);
        Ok(())
    }

    fn pre_use(&mut self) -> Result<(), BridgeError> {
        let binder = self.backend.as_mut().ok_or_else(not_defined)?;
        binder.pre_use(self.value.use_data(), self.indicator.map(Cell::get))
    }

    fn post_use(&mut self, got_data: bool) -> Result<(), BridgeError> {
        let binder = self.backend.as_mut().ok_or_else(not_defined)?;
        let mut indicator = self.indicator.map(Cell::get);
        binder.post_use(got_data, indicator.as_mut())?;
        if let (Some(cell), Some(value)) = (self.indicator, indicator) {
            cell.set(value);
        }
        Ok(())
    }

    fn clean_up(&mut self) {
        if let Some(mut binder) = self.backend.take() {
            binder.clean_up();
        }
    }
}

struct VectorUse<'a, T> {
    values: &'a [T],
    indicators: Option<&'a [Indicator]>,
    name: Option<String>,
    backend: Option<Box<dyn VectorUseBackend>>,
}

impl<T: Exchange> UseElement for VectorUse<'_, T> {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn bind(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), BridgeError> {
        let mut binder = backend.make_vector_use_backend()?;
        match &self.name {
            Some(name) => binder.bind_by_name(name, T::EXCHANGE_TYPE)?,
            None => binder.bind_by_pos(position, T::EXCHANGE_TYPE)?,
        }
        self.backend = Some(binder);
        Ok(())
    }

    fn pre_use(&mut self) -> Result<(), BridgeError> {
        if let Some(indicators) = self.indicators {
            if indicators.len() != self.values.len() {
                return Err(QueryError::IndicatorSizeMismatch {
                    values: self.values.len(),
                    indicators: indicators.len(),
                }
                .into());
            }
        }
        let binder = self.backend.as_mut().ok_or_else(not_defined)?;
        let data: Vec<UseData<'_>> = self.values.iter().map(Exchange::use_data).collect();
        binder.pre_use(&data, self.indicators)
    }

    fn post_use(&mut self, _got_data: bool) -> Result<(), BridgeError> {
        Ok(())
    }

    fn clean_up(&mut self) {
        if let Some(mut binder) = self.backend.take() {
            binder.clean_up();
        }
    }
}

/// Stand-in for the row among the into bindings. The row's columns are
/// fetched by [`RowColumnInto`] elements injected after description.
pub(crate) struct RowMarker;

impl IntoElement for RowMarker {
    fn size(&self) -> Result<usize, BridgeError> {
        Ok(1)
    }

    fn define(
        &mut self,
        _backend: &mut dyn StatementBackend,
        _position: &mut usize,
    ) -> Result<(), BridgeError> {
        Ok(())
    }

    fn pre_fetch(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn post_fetch(&mut self, _got_data: bool, _called_from_fetch: bool) -> Result<(), BridgeError> {
        Ok(())
    }

    fn resize(&mut self, _rows: usize) -> Result<(), BridgeError> {
        Ok(())
    }

    fn clean_up(&mut self) {}
}

/// Fetches one column of a dynamic row.
pub(crate) struct RowColumnInto<'a> {
    row: &'a RefCell<Row>,
    column: usize,
    exchange_type: ExchangeType,
    blob: Option<Blob>,
    backend: Option<Box<dyn StandardIntoBackend>>,
}

impl<'a> RowColumnInto<'a> {
    /// BLOB columns need a session-made `blob` to receive the data.
    pub(crate) fn new(
        row: &'a RefCell<Row>,
        column: usize,
        exchange_type: ExchangeType,
        blob: Option<Blob>,
    ) -> Self {
        Self {
            row,
            column,
            exchange_type,
            blob,
            backend: None,
        }
    }
}

impl IntoElement for RowColumnInto<'_> {
    fn size(&self) -> Result<usize, BridgeError> {
        Ok(1)
    }

    fn define(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), BridgeError> {
        let mut binder = backend.make_into_backend()?;
        binder.define_by_pos(position, self.exchange_type)?;
        self.backend = Some(binder);
        Ok(())
    }

    fn pre_fetch(&mut self) -> Result<(), BridgeError> {
        self.backend.as_mut().ok_or_else(not_defined)?.pre_fetch()
    }

    fn post_fetch(&mut self, got_data: bool, called_from_fetch: bool) -> Result<(), BridgeError> {
        let binder = self.backend.as_mut().ok_or_else(not_defined)?;
        let mut row = borrow_target(self.row)?;
        let mut indicator = row.indicator(self.column).unwrap_or(Indicator::Ok);

        match self.blob.as_mut() {
            Some(blob) => {
                binder.post_fetch(
                    got_data,
                    called_from_fetch,
                    IntoData::Blob(blob),
                    Some(&mut indicator),
                )?;
                if got_data && indicator != Indicator::Null {
                    let bytes = blob.to_vec()?;
                    if let Some(value) = row.value_mut(self.column) {
                        *value = crate::types::Value::Blob(bytes);
                    }
                }
            }
            None => {
                let target = row
                    .value_mut(self.column)
                    .and_then(|value| value.into_data())
                    .ok_or_else(|| {
                        QueryError::InvalidState(format!(
                            "row column {} has no storage",
                            self.column
                        ))
                    })?;
                binder.post_fetch(got_data, called_from_fetch, target, Some(&mut indicator))?;
            }
        }

        if let Some(slot) = row.indicator_mut(self.column) {
            *slot = indicator;
        }
        Ok(())
    }

    fn resize(&mut self, _rows: usize) -> Result<(), BridgeError> {
        Ok(())
    }

    fn clean_up(&mut self) {
        if let Some(mut binder) = self.backend.take() {
            binder.clean_up();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_exchange_types() {
        let id = RefCell::new(0i32);
        let names = RefCell::new(vec![String::new(); 3]);
        let row = RefCell::new(Row::new());

        assert_eq!(into_value(&id).exchange_type(), Some(ExchangeType::Int32));
        assert_eq!(into_vec(&names).exchange_type(), Some(ExchangeType::String));
        assert_eq!(into_row(&row).exchange_type(), None);

        let value = 2.5f64;
        let binding = use_value(&value).named("price");
        assert_eq!(binding.exchange_type(), ExchangeType::Double);
        assert_eq!(binding.name(), Some("price"));
    }

    #[test]
    fn test_vector_sizes() {
        let values = RefCell::new(vec![0i64; 4]);
        let binding = into_vec(&values);
        match binding.kind {
            IntoKind::Element(element) => assert_eq!(element.size().unwrap(), 4),
            IntoKind::Row(_) => panic!("expected element"),
        }

        let ids = [1u32, 2, 3];
        assert_eq!(use_vec(&ids).element.size(), 3);
    }

    #[test]
    fn test_use_vector_indicator_length_checked() {
        let ids = [1u32, 2, 3];
        let inds = [Indicator::Ok];
        let mut binding = use_vec_ind(&ids, &inds);
        let err = binding.element.pre_use().unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Query(QueryError::IndicatorSizeMismatch { values: 3, indicators: 1 })
        ));
    }

    #[test]
    fn test_post_fetch_before_define_fails() {
        let id = RefCell::new(0i32);
        if let IntoKind::Element(mut element) = into_value(&id).kind {
            assert!(element.post_fetch(true, false).is_err());
        };
    }
}
