//! 記憶體內交易式儲存
//!
//! 庫存、工單、預約、生產實績與庫存帳共用一把鎖。每次 [`InMemoryStore::transaction`]
//! 都在鎖內執行，閉包回傳 `Err`（或中途 panic）時依回滾日誌還原所有修改，
//! 因此任何多步驟異動都是全有或全無。

use chrono::{DateTime, Utc};
use mrp_core::{
    InventoryLogEntry, IoType, MrpError, ProductionOrder, ProductionResult, Reservation,
    ReservationState, Result, StockLevel, StockQueryService,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::dirty_tracking::DirtyTracker;

/// 庫存列鍵（品目, 倉庫）
pub type StockKey = (String, String);

fn stock_key(item_code: &str, warehouse_code: &str) -> StockKey {
    (item_code.to_string(), warehouse_code.to_string())
}

#[derive(Debug, Default)]
struct LedgerState {
    stock: BTreeMap<StockKey, StockLevel>,
    orders: BTreeMap<String, ProductionOrder>,
    reservations: Vec<Reservation>,
    results: Vec<ProductionResult>,
    log: Vec<InventoryLogEntry>,
}

impl LedgerState {
    fn stock_of(&self, item_code: &str) -> Vec<StockLevel> {
        self.stock
            .range(stock_key(item_code, "")..)
            .take_while(|((item, _), _)| item == item_code)
            .map(|(_, row)| row.clone())
            .collect()
    }

    fn order_log(&self, order_no: &str) -> Vec<InventoryLogEntry> {
        self.log
            .iter()
            .filter(|e| e.ref_no.as_deref() == Some(order_no))
            .cloned()
            .collect()
    }
}

/// 回滾日誌：記錄每個鍵第一次被修改前的值
#[derive(Debug)]
struct Journal {
    stock_rows: DirtyTracker<StockKey>,
    stock_before: Vec<(StockKey, Option<StockLevel>)>,
    order_keys: DirtyTracker<String>,
    orders_before: Vec<(String, Option<ProductionOrder>)>,
    reservation_rows: DirtyTracker<usize>,
    reservations_before: Vec<(usize, Reservation)>,
    reservations_len: usize,
    results_len: usize,
    log_len: usize,
}

impl Journal {
    fn begin(state: &LedgerState) -> Self {
        Self {
            stock_rows: DirtyTracker::new(),
            stock_before: Vec::new(),
            order_keys: DirtyTracker::new(),
            orders_before: Vec::new(),
            reservation_rows: DirtyTracker::new(),
            reservations_before: Vec::new(),
            reservations_len: state.reservations.len(),
            results_len: state.results.len(),
            log_len: state.log.len(),
        }
    }

    fn rollback(&mut self, state: &mut LedgerState) {
        state.log.truncate(self.log_len);
        state.results.truncate(self.results_len);
        for (idx, before) in std::mem::take(&mut self.reservations_before) {
            state.reservations[idx] = before;
        }
        state.reservations.truncate(self.reservations_len);
        for (key, before) in std::mem::take(&mut self.stock_before) {
            match before {
                Some(row) => state.stock.insert(key, row),
                None => state.stock.remove(&key),
            };
        }
        for (order_no, before) in std::mem::take(&mut self.orders_before) {
            match before {
                Some(order) => state.orders.insert(order_no, order),
                None => state.orders.remove(&order_no),
            };
        }
    }
}

/// 交易（只在 [`InMemoryStore::transaction`] 內存在）
///
/// 未提交就被丟棄時自動回滾。
pub struct Transaction<'a> {
    state: &'a mut LedgerState,
    journal: Journal,
    now: DateTime<Utc>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    fn begin(state: &'a mut LedgerState) -> Self {
        let journal = Journal::begin(state);
        Self {
            state,
            journal,
            now: Utc::now(),
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }

    /// 交易時間戳（同一交易內的所有記錄共用）
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn stock_level(&self, item_code: &str, warehouse_code: &str) -> Option<&StockLevel> {
        self.state.stock.get(&stock_key(item_code, warehouse_code))
    }

    pub fn stock_levels(&self, item_code: &str) -> Vec<StockLevel> {
        self.state.stock_of(item_code)
    }

    /// 調整庫存列（唯一的庫存修改入口）
    ///
    /// 調整後必須滿足 `0 <= allocated_qty <= stock_qty`。
    /// 不存在的列只有在現有庫存增加時才會建立。
    pub fn adjust_stock(
        &mut self,
        item_code: &str,
        warehouse_code: &str,
        stock_delta: Decimal,
        alloc_delta: Decimal,
    ) -> Result<StockLevel> {
        let key = stock_key(item_code, warehouse_code);
        let before = self.state.stock.get(&key).cloned();

        let mut row = match &before {
            Some(row) => row.clone(),
            None if stock_delta > Decimal::ZERO => StockLevel::new(
                item_code.to_string(),
                warehouse_code.to_string(),
                Decimal::ZERO,
            ),
            None => {
                return Err(MrpError::InvariantViolation(format!(
                    "倉庫 {} 沒有品目 {} 的庫存資料",
                    warehouse_code, item_code
                )))
            }
        };
        row.apply_delta(stock_delta, alloc_delta)?;

        if self.journal.stock_rows.mark_dirty(key.clone()) {
            self.journal.stock_before.push((key.clone(), before));
        }
        self.state.stock.insert(key, row.clone());
        Ok(row)
    }

    /// 附加庫存帳
    pub fn append_log(&mut self, entry: InventoryLogEntry) {
        self.state.log.push(entry);
    }

    pub fn order(&self, order_no: &str) -> Result<&ProductionOrder> {
        self.state
            .orders
            .get(order_no)
            .ok_or_else(|| MrpError::OrderNotFound(order_no.to_string()))
    }

    pub fn contains_order(&self, order_no: &str) -> bool {
        self.state.orders.contains_key(order_no)
    }

    /// 新增或覆寫工單
    pub fn put_order(&mut self, mut order: ProductionOrder) {
        order.updated_at = self.now;
        let key = order.order_no.clone();
        if self.journal.order_keys.mark_dirty(key.clone()) {
            let before = self.state.orders.get(&key).cloned();
            self.journal.orders_before.push((key.clone(), before));
        }
        self.state.orders.insert(key, order);
    }

    /// 工單的全部預約記錄（依建立順序）
    pub fn reservations(&self, order_no: &str) -> Vec<Reservation> {
        self.state
            .reservations
            .iter()
            .filter(|r| r.order_no == order_no)
            .cloned()
            .collect()
    }

    pub fn insert_reservation(&mut self, reservation: Reservation) {
        self.state.reservations.push(reservation);
    }

    pub fn set_reservation_state(&mut self, id: Uuid, state: ReservationState) -> Result<()> {
        let idx = self
            .state
            .reservations
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| MrpError::InvariantViolation(format!("找不到預約記錄: {}", id)))?;

        if idx < self.journal.reservations_len && self.journal.reservation_rows.mark_dirty(idx) {
            self.journal
                .reservations_before
                .push((idx, self.state.reservations[idx].clone()));
        }
        self.state.reservations[idx].state = state;
        Ok(())
    }

    pub fn results(&self, order_no: &str) -> Vec<ProductionResult> {
        self.state
            .results
            .iter()
            .filter(|r| r.order_no == order_no)
            .cloned()
            .collect()
    }

    pub fn push_result(&mut self, result: ProductionResult) {
        self.state.results.push(result);
    }

    /// 本交易異動過的庫存列數
    pub fn touched_stock_rows(&self) -> usize {
        self.journal.stock_rows.len()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.journal.rollback(self.state);
        }
    }
}

/// 記憶體內儲存
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<LedgerState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得鎖；先前交易 panic 時狀態已由回滾還原，直接沿用
    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>> {
        Ok(self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("先前交易中斷，已回滾並恢復儲存鎖");
            PoisonError::into_inner(poisoned)
        }))
    }

    /// 在單一交易內執行；閉包回傳 `Err` 時所有修改都會還原
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut guard = self.lock()?;
        let mut tx = Transaction::begin(&mut guard);

        match f(&mut tx) {
            Ok(value) => {
                if tx.journal.stock_rows.is_empty() {
                    tracing::debug!("交易提交：未異動庫存");
                } else {
                    tracing::debug!("交易提交：異動庫存 {} 列", tx.touched_stock_rows());
                }
                tx.commit();
                Ok(value)
            }
            Err(err) => {
                tracing::debug!("交易回滾：{}", err);
                drop(tx);
                Err(err)
            }
        }
    }

    /// 入庫（IN）
    pub fn stock_in(
        &self,
        item_code: &str,
        warehouse_code: &str,
        qty: Decimal,
        remark: Option<String>,
    ) -> Result<StockLevel> {
        require_positive(qty, "入庫數量")?;
        self.transaction(|tx| {
            let row = tx.adjust_stock(item_code, warehouse_code, qty, Decimal::ZERO)?;
            let entry = InventoryLogEntry::new(IoType::In, item_code.to_string(), qty, tx.now())
                .to_warehouse(warehouse_code)
                .with_deltas(qty, Decimal::ZERO)
                .with_remark(remark);
            tx.append_log(entry);
            Ok(row)
        })
    }

    /// 出庫（OUT）；不可動用已分配的數量
    pub fn stock_out(
        &self,
        item_code: &str,
        warehouse_code: &str,
        qty: Decimal,
        remark: Option<String>,
    ) -> Result<StockLevel> {
        require_positive(qty, "出庫數量")?;
        self.transaction(|tx| {
            let row = tx.adjust_stock(item_code, warehouse_code, -qty, Decimal::ZERO)?;
            let entry = InventoryLogEntry::new(IoType::Out, item_code.to_string(), qty, tx.now())
                .from_warehouse(warehouse_code)
                .with_deltas(-qty, Decimal::ZERO)
                .with_remark(remark);
            tx.append_log(entry);
            Ok(row)
        })
    }

    pub fn stock_level(&self, item_code: &str, warehouse_code: &str) -> Result<Option<StockLevel>> {
        Ok(self
            .lock()?
            .stock
            .get(&stock_key(item_code, warehouse_code))
            .cloned())
    }

    /// 全部庫存列（依品目、倉庫排序）
    pub fn stock_snapshot(&self) -> Result<Vec<StockLevel>> {
        Ok(self.lock()?.stock.values().cloned().collect())
    }

    pub fn order(&self, order_no: &str) -> Result<ProductionOrder> {
        self.lock()?
            .orders
            .get(order_no)
            .cloned()
            .ok_or_else(|| MrpError::OrderNotFound(order_no.to_string()))
    }

    pub fn reservations(&self, order_no: &str) -> Result<Vec<Reservation>> {
        Ok(self
            .lock()?
            .reservations
            .iter()
            .filter(|r| r.order_no == order_no)
            .cloned()
            .collect())
    }

    pub fn results(&self, order_no: &str) -> Result<Vec<ProductionResult>> {
        Ok(self
            .lock()?
            .results
            .iter()
            .filter(|r| r.order_no == order_no)
            .cloned()
            .collect())
    }

    /// 工單相關的庫存帳（依時間順序）
    pub fn order_log(&self, order_no: &str) -> Result<Vec<InventoryLogEntry>> {
        Ok(self.lock()?.order_log(order_no))
    }

    /// 全部庫存帳
    pub fn log(&self) -> Result<Vec<InventoryLogEntry>> {
        Ok(self.lock()?.log.clone())
    }
}

impl StockQueryService for InMemoryStore {
    fn stock_levels(&self, item_code: &str) -> Result<Vec<StockLevel>> {
        Ok(self.lock()?.stock_of(item_code))
    }
}

fn require_positive(qty: Decimal, label: &str) -> Result<()> {
    if qty <= Decimal::ZERO {
        return Err(MrpError::Validation(format!("{}必須大於 0: {}", label, qty)));
    }
    Ok(())
}
