use super::handles::SqliteRowIdBackend;
use super::statement::{SlotKey, StatementData, UseSlot};
use crate::backend::{StandardIntoBackend, StandardUseBackend, VectorIntoBackend, VectorUseBackend};
use crate::error::{BridgeError, ConversionError, QueryError};
use crate::exchange::convert::{
    record_no_data, record_null, record_outcome, store, to_native, NativeValue, Stored,
};
use crate::exchange::{ExchangeType, Indicator, IntoData, RowId, UseData};
use std::cell::RefCell;
use std::rc::Rc;

fn check_supported(exchange_type: ExchangeType, operation: &'static str) -> Result<(), BridgeError> {
    if exchange_type == ExchangeType::Statement {
        return Err(QueryError::UnsupportedExchange {
            exchange_type,
            operation,
        }
        .into());
    }
    Ok(())
}

fn rowid_backend_mut(rowid: &mut RowId) -> Result<&mut SqliteRowIdBackend, BridgeError> {
    rowid
        .backend_mut()
        .as_any_mut()
        .downcast_mut::<SqliteRowIdBackend>()
        .ok_or_else(|| {
            QueryError::InvalidState("rowid was not created by this backend".to_string()).into()
        })
}

fn rowid_value(rowid: &RowId) -> Result<i64, BridgeError> {
    rowid
        .backend()
        .as_any()
        .downcast_ref::<SqliteRowIdBackend>()
        .map(|r| r.value)
        .ok_or_else(|| {
            QueryError::InvalidState("rowid was not created by this backend".to_string()).into()
        })
}

/// Write `value` into `target`, updating the indicator.
fn write_value(
    value: &NativeValue,
    target: IntoData<'_>,
    indicator: Option<&mut Indicator>,
    position: usize,
) -> Result<(), BridgeError> {
    if value.is_null() {
        return record_null(indicator, position);
    }
    let mut target = target;
    if let IntoData::RowId(rowid) = &mut target {
        rowid_backend_mut(rowid)?.value = match value {
            NativeValue::Integer(i) => *i,
            other => {
                return Err(ConversionError::TypeMismatch {
                    expected: "integer",
                    found: other.kind(),
                }
                .into())
            }
        };
        return record_outcome(Stored::Complete, indicator, position);
    }
    let stored = store(value, &mut target)?;
    record_outcome(stored, indicator, position)
}

fn native_of(value: &UseData<'_>, indicator: Option<Indicator>) -> Result<NativeValue, BridgeError> {
    if indicator == Some(Indicator::Null) {
        return Ok(NativeValue::Null);
    }
    match value {
        UseData::RowId(rowid) => Ok(NativeValue::Integer(rowid_value(rowid)?)),
        other => to_native(other),
    }
}

/// Single-value output binder.
pub(super) struct SqliteIntoBackend {
    data: Rc<RefCell<StatementData>>,
    column: usize,
}

impl SqliteIntoBackend {
    pub(super) fn new(data: Rc<RefCell<StatementData>>) -> Self {
        Self { data, column: 0 }
    }
}

impl StandardIntoBackend for SqliteIntoBackend {
    fn define_by_pos(
        &mut self,
        position: &mut usize,
        exchange_type: ExchangeType,
    ) -> Result<(), BridgeError> {
        check_supported(exchange_type, "into")?;
        self.column = *position - 1;
        *position += 1;
        Ok(())
    }

    fn pre_fetch(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn post_fetch(
        &mut self,
        got_data: bool,
        called_from_fetch: bool,
        target: IntoData<'_>,
        indicator: Option<&mut Indicator>,
    ) -> Result<(), BridgeError> {
        if !got_data {
            // Running off the end of a fetch loop leaves the last row in place.
            if called_from_fetch {
                return Ok(());
            }
            return record_no_data(indicator, self.column + 1);
        }
        let data = self.data.borrow();
        let value = data.value(0, self.column)?;
        write_value(value, target, indicator, self.column + 1)
    }

    fn clean_up(&mut self) {}
}

/// Column output binder.
pub(super) struct SqliteVectorIntoBackend {
    data: Rc<RefCell<StatementData>>,
    column: usize,
}

impl SqliteVectorIntoBackend {
    pub(super) fn new(data: Rc<RefCell<StatementData>>) -> Self {
        Self { data, column: 0 }
    }
}

impl VectorIntoBackend for SqliteVectorIntoBackend {
    fn define_by_pos(
        &mut self,
        position: &mut usize,
        exchange_type: ExchangeType,
    ) -> Result<(), BridgeError> {
        check_supported(exchange_type, "vector into")?;
        self.column = *position - 1;
        *position += 1;
        Ok(())
    }

    fn pre_fetch(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn post_fetch(
        &mut self,
        got_data: bool,
        targets: &mut [IntoData<'_>],
        indicators: Option<&mut [Indicator]>,
    ) -> Result<(), BridgeError> {
        if !got_data {
            return Ok(());
        }
        let data = self.data.borrow();
        let rows = targets.len().min(data.batch_len);
        let mut indicators = indicators;

        for (offset, target) in targets.iter_mut().take(rows).enumerate() {
            let value = data.value(offset, self.column)?;
            let indicator = indicators.as_deref_mut().and_then(|inds| inds.get_mut(offset));
            let target = reborrow(target);
            write_value(value, target, indicator, self.column + 1)?;
        }
        Ok(())
    }

    fn clean_up(&mut self) {}
}

/// Short-lived `IntoData` pointing at the same storage as `target`.
fn reborrow<'t>(target: &'t mut IntoData<'_>) -> IntoData<'t> {
    match target {
        IntoData::Char(v) => IntoData::Char(v),
        IntoData::CString(v) => IntoData::CString(v),
        IntoData::String(v) => IntoData::String(v),
        IntoData::Int8(v) => IntoData::Int8(v),
        IntoData::UInt8(v) => IntoData::UInt8(v),
        IntoData::Int16(v) => IntoData::Int16(v),
        IntoData::UInt16(v) => IntoData::UInt16(v),
        IntoData::Int32(v) => IntoData::Int32(v),
        IntoData::UInt32(v) => IntoData::UInt32(v),
        IntoData::Int64(v) => IntoData::Int64(v),
        IntoData::UInt64(v) => IntoData::UInt64(v),
        IntoData::Double(v) => IntoData::Double(v),
        IntoData::DateTime(v) => IntoData::DateTime(v),
        IntoData::Blob(v) => IntoData::Blob(v),
        IntoData::RowId(v) => IntoData::RowId(v),
        IntoData::Statement(v) => IntoData::Statement(v),
    }
}

fn bind_slot(
    data: &Rc<RefCell<StatementData>>,
    key: SlotKey,
    exchange_type: ExchangeType,
    operation: &'static str,
) -> Result<usize, BridgeError> {
    check_supported(exchange_type, operation)?;
    let mut data = data.borrow_mut();
    data.uses.push(UseSlot {
        key,
        values: Vec::new(),
    });
    Ok(data.uses.len() - 1)
}

fn slot_mut<'d>(
    data: &'d mut StatementData,
    slot: Option<usize>,
) -> Result<&'d mut UseSlot, BridgeError> {
    slot.and_then(|index| data.uses.get_mut(index))
        .ok_or_else(|| QueryError::InvalidState("use binding is not bound".to_string()).into())
}

/// Single-value input binder.
pub(super) struct SqliteUseBackend {
    data: Rc<RefCell<StatementData>>,
    slot: Option<usize>,
}

impl SqliteUseBackend {
    pub(super) fn new(data: Rc<RefCell<StatementData>>) -> Self {
        Self { data, slot: None }
    }
}

impl StandardUseBackend for SqliteUseBackend {
    fn bind_by_pos(
        &mut self,
        position: &mut usize,
        exchange_type: ExchangeType,
    ) -> Result<(), BridgeError> {
        self.slot = Some(bind_slot(
            &self.data,
            SlotKey::Position(*position),
            exchange_type,
            "use",
        )?);
        *position += 1;
        Ok(())
    }

    fn bind_by_name(&mut self, name: &str, exchange_type: ExchangeType) -> Result<(), BridgeError> {
        self.slot = Some(bind_slot(
            &self.data,
            SlotKey::Name(name.to_string()),
            exchange_type,
            "use",
        )?);
        Ok(())
    }

    fn pre_use(&mut self, value: UseData<'_>, indicator: Option<Indicator>) -> Result<(), BridgeError> {
        let native = native_of(&value, indicator)?;
        let mut data = self.data.borrow_mut();
        slot_mut(&mut data, self.slot)?.values = vec![native];
        Ok(())
    }

    fn post_use(&mut self, _got_data: bool, _indicator: Option<&mut Indicator>) -> Result<(), BridgeError> {
        Ok(())
    }

    fn clean_up(&mut self) {
        self.slot = None;
    }
}

/// Column input binder; one value per bulk row.
pub(super) struct SqliteVectorUseBackend {
    data: Rc<RefCell<StatementData>>,
    slot: Option<usize>,
}

impl SqliteVectorUseBackend {
    pub(super) fn new(data: Rc<RefCell<StatementData>>) -> Self {
        Self { data, slot: None }
    }
}

impl VectorUseBackend for SqliteVectorUseBackend {
    fn bind_by_pos(
        &mut self,
        position: &mut usize,
        exchange_type: ExchangeType,
    ) -> Result<(), BridgeError> {
        self.slot = Some(bind_slot(
            &self.data,
            SlotKey::Position(*position),
            exchange_type,
            "vector use",
        )?);
        *position += 1;
        Ok(())
    }

    fn bind_by_name(&mut self, name: &str, exchange_type: ExchangeType) -> Result<(), BridgeError> {
        self.slot = Some(bind_slot(
            &self.data,
            SlotKey::Name(name.to_string()),
            exchange_type,
            "vector use",
        )?);
        Ok(())
    }

    fn pre_use(
        &mut self,
        values: &[UseData<'_>],
        indicators: Option<&[Indicator]>,
    ) -> Result<(), BridgeError> {
        let natives = values
            .iter()
            .enumerate()
            .map(|(i, value)| native_of(value, indicators.and_then(|inds| inds.get(i).copied())))
            .collect::<Result<Vec<_>, _>>()?;
        let mut data = self.data.borrow_mut();
        slot_mut(&mut data, self.slot)?.values = natives;
        Ok(())
    }

    fn clean_up(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::CharBuf;

    fn data_with(rows: Vec<Vec<NativeValue>>) -> Rc<RefCell<StatementData>> {
        let data = StatementData {
            batch_len: rows.len(),
            rows,
            ..Default::default()
        };
        Rc::new(RefCell::new(data))
    }

    #[test]
    fn test_into_null_and_truncation() {
        let data = data_with(vec![vec![
            NativeValue::Null,
            NativeValue::Text("abcdef".into()),
        ]]);
        let mut position = 1;

        let mut first = SqliteIntoBackend::new(data.clone());
        first.define_by_pos(&mut position, ExchangeType::Int32).unwrap();
        let mut second = SqliteIntoBackend::new(data);
        second.define_by_pos(&mut position, ExchangeType::CString).unwrap();
        assert_eq!(position, 3);

        let mut value = 7i32;
        let mut ind = Indicator::Ok;
        first
            .post_fetch(true, false, IntoData::Int32(&mut value), Some(&mut ind))
            .unwrap();
        assert_eq!(ind, Indicator::Null);
        assert_eq!(value, 7);

        let err = first
            .post_fetch(true, false, IntoData::Int32(&mut value), None)
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Query(QueryError::NullWithoutIndicator { position: 1 })
        ));

        let mut buf = CharBuf::new(3);
        second
            .post_fetch(true, false, IntoData::CString(&mut buf), Some(&mut ind))
            .unwrap();
        assert_eq!(ind, Indicator::Truncated);
        assert_eq!(buf.as_str(), "abc");
    }

    #[test]
    fn test_into_untouched_without_data() {
        let data = data_with(vec![]);
        let mut binder = SqliteIntoBackend::new(data);
        binder.define_by_pos(&mut 1, ExchangeType::Int64).unwrap();

        let mut value = 5i64;
        let mut ind = Indicator::Truncated;
        binder
            .post_fetch(false, true, IntoData::Int64(&mut value), Some(&mut ind))
            .unwrap();
        assert_eq!(value, 5);
        assert_eq!(ind, Indicator::Truncated);
    }

    #[test]
    fn test_statement_exchange_rejected() {
        let data = data_with(vec![]);
        let mut binder = SqliteUseBackend::new(data);
        let err = binder
            .bind_by_pos(&mut 1, ExchangeType::Statement)
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Query(QueryError::UnsupportedExchange { .. })
        ));
    }

    #[test]
    fn test_vector_use_with_indicators() {
        let data = data_with(vec![]);
        let mut binder = SqliteVectorUseBackend::new(data.clone());
        binder.bind_by_name("v", ExchangeType::Int32).unwrap();
        binder
            .pre_use(
                &[UseData::Int32(1), UseData::Int32(2)],
                Some(&[Indicator::Ok, Indicator::Null]),
            )
            .unwrap();

        let data = data.borrow();
        assert_eq!(data.uses[0].key, SlotKey::Name("v".to_string()));
        assert_eq!(
            data.uses[0].values,
            vec![NativeValue::Integer(1), NativeValue::Null]
        );
    }
}
