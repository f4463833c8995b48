use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{CompanyId, LineItemId, OfferId, OrderId, PartyId};
use domain::{
    BookingOffer, ClientContact, CommercialTerms, CurrencyCode, Money, OfferStatus,
    OfferTransition, OrderLineItem, ServiceCategory, StayDetails, SupplierPaymentTerms,
    TravelOrder,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    EventId, EventQuery, EventRecord, Result, StoreError,
    store::{EventLog, EventStream, OfferStore, OrderLedger, WebhookReceipts},
};

const OFFER_COLUMNS: &str = "id, company_id, client_party_id, partner_order_id, \
     hotel_ref, hotel_name, hotel_address, room_name, meal, check_in, check_out, guest_count, \
     currency, supplier_amount, client_amount, tariff_type, book_hash, \
     client_name, client_email, client_phone, \
     payment_mode, payment_status, checkout_session_id, payment_intent_id, \
     status, supplier_order_id, supplier_payment_type, supplier_payment_amount, \
     supplier_payment_currency, confirmation_number, error_message, failure_kind, \
     created_at, updated_at, paid_at, booked_at";

const EVENT_COLUMNS: &str =
    "sequence, id, offer_id, company_id, event_type, event_payload, created_at, created_by";

const ORDER_COLUMNS: &str = "id, company_id, client_party_id, client_display_name, status, \
     order_type, destination, date_from, date_to, created_at";

const LINE_ITEM_COLUMNS: &str = "id, order_id, company_id, category, ref_nr, service_name, \
     room, board, supplier_name, currency, client_price, service_price, date_from, date_to, \
     reservation_status, created_at";

/// Page size used when streaming the whole event log.
const STREAM_PAGE_SIZE: i64 = 500;

/// PostgreSQL-backed booking store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL booking store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Loads an offer and locks its row until the transaction ends.
    async fn lock_offer(
        tx: &mut Transaction<'_, Postgres>,
        id: OfferId,
    ) -> Result<BookingOffer> {
        let sql = format!("SELECT {OFFER_COLUMNS} FROM booking_offers WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(StoreError::OfferNotFound(id))?;
        row_to_offer(row)
    }
}

fn corrupt(column: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{column}: {err}"))
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| corrupt(column, e))
}

fn parse_optional_column<T>(row: &PgRow, column: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| value.parse().map_err(|e| corrupt(column, e)))
        .transpose()
}

fn currency_column(row: &PgRow, column: &str) -> Result<CurrencyCode> {
    let raw: String = row.try_get(column)?;
    CurrencyCode::new(raw).map_err(|e| corrupt(column, e))
}

fn row_to_offer(row: PgRow) -> Result<BookingOffer> {
    let guest_count: i32 = row.try_get("guest_count")?;
    let guest_count = u32::try_from(guest_count).map_err(|e| corrupt("guest_count", e))?;

    let supplier_payment_type: Option<String> = row.try_get("supplier_payment_type")?;
    let supplier_payment_amount: Option<i64> = row.try_get("supplier_payment_amount")?;
    let supplier_payment_currency: Option<String> = row.try_get("supplier_payment_currency")?;
    let supplier_terms = match (
        supplier_payment_type,
        supplier_payment_amount,
        supplier_payment_currency,
    ) {
        (Some(payment_type), Some(amount), Some(currency)) => Some(SupplierPaymentTerms {
            payment_type,
            amount: Money::from_minor(amount),
            currency: CurrencyCode::new(currency)
                .map_err(|e| corrupt("supplier_payment_currency", e))?,
        }),
        _ => None,
    };

    Ok(BookingOffer {
        id: OfferId::from_uuid(row.try_get::<Uuid, _>("id")?),
        company_id: CompanyId::from_uuid(row.try_get::<Uuid, _>("company_id")?),
        client_party_id: row
            .try_get::<Option<Uuid>, _>("client_party_id")?
            .map(PartyId::from_uuid),
        partner_order_id: row.try_get("partner_order_id")?,
        stay: StayDetails {
            hotel_ref: row.try_get("hotel_ref")?,
            hotel_name: row.try_get("hotel_name")?,
            hotel_address: row.try_get("hotel_address")?,
            room_name: row.try_get("room_name")?,
            meal: row.try_get("meal")?,
            check_in: row.try_get("check_in")?,
            check_out: row.try_get("check_out")?,
            guest_count,
        },
        terms: CommercialTerms {
            currency: currency_column(&row, "currency")?,
            supplier_amount: Money::from_minor(row.try_get("supplier_amount")?),
            client_amount: Money::from_minor(row.try_get("client_amount")?),
            tariff_type: parse_column(&row, "tariff_type")?,
            book_hash: row.try_get("book_hash")?,
        },
        client: ClientContact {
            name: row.try_get("client_name")?,
            email: row.try_get("client_email")?,
            phone: row.try_get("client_phone")?,
        },
        payment_mode: parse_column(&row, "payment_mode")?,
        payment_status: parse_column(&row, "payment_status")?,
        checkout_session_id: row.try_get("checkout_session_id")?,
        payment_intent_id: row.try_get("payment_intent_id")?,
        status: parse_column(&row, "status")?,
        supplier_order_id: row.try_get("supplier_order_id")?,
        supplier_terms,
        confirmation_number: row.try_get("confirmation_number")?,
        error_message: row.try_get("error_message")?,
        failure_kind: parse_optional_column(&row, "failure_kind")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        paid_at: row.try_get("paid_at")?,
        booked_at: row.try_get("booked_at")?,
    })
}

fn row_to_event(row: PgRow) -> Result<EventRecord> {
    let payload: Option<serde_json::Value> = row.try_get("event_payload")?;
    Ok(EventRecord {
        event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
        sequence: row.try_get("sequence")?,
        offer_id: OfferId::from_uuid(row.try_get::<Uuid, _>("offer_id")?),
        company_id: CompanyId::from_uuid(row.try_get::<Uuid, _>("company_id")?),
        event_type: row.try_get("event_type")?,
        payload: payload.unwrap_or(serde_json::Value::Null),
        created_at: row.try_get("created_at")?,
        created_by: row.try_get("created_by")?,
    })
}

fn row_to_order(row: PgRow) -> Result<TravelOrder> {
    Ok(TravelOrder {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        company_id: CompanyId::from_uuid(row.try_get::<Uuid, _>("company_id")?),
        client_party_id: PartyId::from_uuid(row.try_get::<Uuid, _>("client_party_id")?),
        client_display_name: row.try_get("client_display_name")?,
        status: row.try_get("status")?,
        order_type: row.try_get("order_type")?,
        destination: row.try_get("destination")?,
        date_from: row.try_get("date_from")?,
        date_to: row.try_get("date_to")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_line_item(row: PgRow) -> Result<OrderLineItem> {
    let category: String = row.try_get("category")?;
    let category = match category.as_str() {
        "accommodation" => ServiceCategory::Accommodation,
        other => return Err(corrupt("category", other)),
    };

    Ok(OrderLineItem {
        id: LineItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        company_id: CompanyId::from_uuid(row.try_get::<Uuid, _>("company_id")?),
        category,
        ref_nr: row.try_get("ref_nr")?,
        service_name: row.try_get("service_name")?,
        room: row.try_get("room")?,
        board: row.try_get("board")?,
        supplier_name: row.try_get("supplier_name")?,
        currency: currency_column(&row, "currency")?,
        client_price: Money::from_minor(row.try_get("client_price")?),
        service_price: Money::from_minor(row.try_get("service_price")?),
        date_from: row.try_get("date_from")?,
        date_to: row.try_get("date_to")?,
        reservation_status: row.try_get("reservation_status")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn fetch_event_page(pool: &PgPool, after_sequence: i64) -> Result<Vec<EventRecord>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM booking_events WHERE sequence > $1 ORDER BY sequence ASC LIMIT $2"
    );
    let rows = sqlx::query(&sql)
        .bind(after_sequence)
        .bind(STREAM_PAGE_SIZE)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_event).collect()
}

#[async_trait]
impl OfferStore for PostgresStore {
    async fn insert_offer(&self, offer: BookingOffer) -> Result<()> {
        let supplier_terms = offer.supplier_terms.as_ref();
        sqlx::query(
            r#"
            INSERT INTO booking_offers (
                id, company_id, client_party_id, partner_order_id,
                hotel_ref, hotel_name, hotel_address, room_name, meal, check_in, check_out, guest_count,
                currency, supplier_amount, client_amount, tariff_type, book_hash,
                client_name, client_email, client_phone,
                payment_mode, payment_status, checkout_session_id, payment_intent_id,
                status, supplier_order_id, supplier_payment_type, supplier_payment_amount,
                supplier_payment_currency, confirmation_number, error_message, failure_kind,
                created_at, updated_at, paid_at, booked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                    $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33, $34, $35, $36)
            "#,
        )
        .bind(offer.id.as_uuid())
        .bind(offer.company_id.as_uuid())
        .bind(offer.client_party_id.map(|id| id.as_uuid()))
        .bind(&offer.partner_order_id)
        .bind(&offer.stay.hotel_ref)
        .bind(&offer.stay.hotel_name)
        .bind(&offer.stay.hotel_address)
        .bind(&offer.stay.room_name)
        .bind(&offer.stay.meal)
        .bind(offer.stay.check_in)
        .bind(offer.stay.check_out)
        .bind(offer.stay.guest_count as i32)
        .bind(offer.terms.currency.as_str())
        .bind(offer.terms.supplier_amount.minor_units())
        .bind(offer.terms.client_amount.minor_units())
        .bind(offer.terms.tariff_type.as_str())
        .bind(&offer.terms.book_hash)
        .bind(&offer.client.name)
        .bind(&offer.client.email)
        .bind(&offer.client.phone)
        .bind(offer.payment_mode.as_str())
        .bind(offer.payment_status.as_str())
        .bind(&offer.checkout_session_id)
        .bind(&offer.payment_intent_id)
        .bind(offer.status.as_str())
        .bind(&offer.supplier_order_id)
        .bind(supplier_terms.map(|t| t.payment_type.clone()))
        .bind(supplier_terms.map(|t| t.amount.minor_units()))
        .bind(supplier_terms.map(|t| t.currency.as_str().to_string()))
        .bind(&offer.confirmation_number)
        .bind(&offer.error_message)
        .bind(offer.failure_kind.map(|k| k.as_str()))
        .bind(offer.created_at)
        .bind(offer.updated_at)
        .bind(offer.paid_at)
        .bind(offer.booked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::DuplicateOffer(offer.id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_offer(&self, id: OfferId) -> Result<Option<BookingOffer>> {
        let sql = format!("SELECT {OFFER_COLUMNS} FROM booking_offers WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_offer).transpose()
    }

    async fn apply_transition(
        &self,
        id: OfferId,
        transition: &OfferTransition,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingOffer>> {
        let mut tx = self.pool.begin().await?;
        let mut offer = Self::lock_offer(&mut tx, id).await?;

        if !transition.admits(&offer) {
            tracing::debug!(
                offer_id = %id,
                status = %offer.status,
                transition = transition.name(),
                "Conditional transition not admitted"
            );
            tx.rollback().await?;
            return Ok(None);
        }
        transition.apply(&mut offer, now);

        let supplier_terms = offer.supplier_terms.as_ref();
        sqlx::query(
            r#"
            UPDATE booking_offers SET
                partner_order_id = $2,
                payment_mode = $3,
                payment_status = $4,
                checkout_session_id = $5,
                payment_intent_id = $6,
                status = $7,
                supplier_order_id = $8,
                supplier_payment_type = $9,
                supplier_payment_amount = $10,
                supplier_payment_currency = $11,
                confirmation_number = $12,
                error_message = $13,
                failure_kind = $14,
                updated_at = $15,
                paid_at = $16,
                booked_at = $17
            WHERE id = $1
            "#,
        )
        .bind(offer.id.as_uuid())
        .bind(&offer.partner_order_id)
        .bind(offer.payment_mode.as_str())
        .bind(offer.payment_status.as_str())
        .bind(&offer.checkout_session_id)
        .bind(&offer.payment_intent_id)
        .bind(offer.status.as_str())
        .bind(&offer.supplier_order_id)
        .bind(supplier_terms.map(|t| t.payment_type.clone()))
        .bind(supplier_terms.map(|t| t.amount.minor_units()))
        .bind(supplier_terms.map(|t| t.currency.as_str().to_string()))
        .bind(&offer.confirmation_number)
        .bind(&offer.error_message)
        .bind(offer.failure_kind.map(|k| k.as_str()))
        .bind(offer.updated_at)
        .bind(offer.paid_at)
        .bind(offer.booked_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(offer))
    }

    async fn update_terms(
        &self,
        id: OfferId,
        terms: CommercialTerms,
        now: DateTime<Utc>,
    ) -> Result<BookingOffer> {
        let mut tx = self.pool.begin().await?;
        let mut offer = Self::lock_offer(&mut tx, id).await?;
        offer.update_terms(terms, now)?;

        sqlx::query(
            r#"
            UPDATE booking_offers SET
                currency = $2,
                supplier_amount = $3,
                client_amount = $4,
                tariff_type = $5,
                book_hash = $6,
                updated_at = $7
            WHERE id = $1 AND payment_status <> 'paid'
            "#,
        )
        .bind(offer.id.as_uuid())
        .bind(offer.terms.currency.as_str())
        .bind(offer.terms.supplier_amount.minor_units())
        .bind(offer.terms.client_amount.minor_units())
        .bind(offer.terms.tariff_type.as_str())
        .bind(&offer.terms.book_hash)
        .bind(offer.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(offer)
    }

    async fn list_offers_by_status(
        &self,
        status: OfferStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<BookingOffer>> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS} FROM booking_offers WHERE status = $1 AND updated_at < $2 ORDER BY updated_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(updated_before)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_offer).collect()
    }
}

#[async_trait]
impl EventLog for PostgresStore {
    async fn append_event(&self, record: EventRecord) -> Result<i64> {
        let payload = (!record.payload.is_null()).then_some(&record.payload);
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO booking_events (id, offer_id, company_id, event_type, event_payload, created_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING sequence
            "#,
        )
        .bind(record.event_id.as_uuid())
        .bind(record.offer_id.as_uuid())
        .bind(record.company_id.as_uuid())
        .bind(&record.event_type)
        .bind(payload)
        .bind(record.created_at)
        .bind(&record.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(sequence)
    }

    async fn events_for_offer(&self, offer_id: OfferId) -> Result<Vec<EventRecord>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM booking_events WHERE offer_id = $1 ORDER BY created_at ASC, sequence ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(offer_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_event).collect()
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventRecord>> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM booking_events WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.offer_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND offer_id = ${param_count}"));
        }
        if query.company_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND company_id = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }

        if query.newest_first {
            sql.push_str(" ORDER BY created_at DESC, sequence DESC");
        } else {
            sql.push_str(" ORDER BY created_at ASC, sequence ASC");
        }

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.offer_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(id) = query.company_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(event_types) = query.event_types {
            sqlx_query = sqlx_query.bind(event_types);
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_event).collect()
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::{TryStreamExt, stream};

        let pool = self.pool.clone();
        let pages = stream::try_unfold((pool, 0_i64, false), |(pool, after, done)| async move {
            if done {
                return Ok::<_, StoreError>(None);
            }
            let page = fetch_event_page(&pool, after).await?;
            let last = page.last().map(|e| e.sequence).unwrap_or(after);
            let done = (page.len() as i64) < STREAM_PAGE_SIZE;
            let records = stream::iter(page.into_iter().map(Ok::<_, StoreError>));
            Ok(Some((records, (pool, last, done))))
        });

        Ok(Box::pin(pages.try_flatten()))
    }
}

#[async_trait]
impl OrderLedger for PostgresStore {
    async fn find_overlapping_order(
        &self,
        company_id: CompanyId,
        client_party_id: PartyId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<TravelOrder>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM travel_orders \
             WHERE company_id = $1 AND client_party_id = $2 AND date_from <= $4 AND date_to >= $3 \
             ORDER BY created_at ASC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(company_id.as_uuid())
            .bind(client_party_id.as_uuid())
            .bind(from)
            .bind(to)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_order).transpose()
    }

    async fn insert_order(&self, order: TravelOrder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO travel_orders (id, company_id, client_party_id, client_display_name, status,
                                       order_type, destination, date_from, date_to, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.company_id.as_uuid())
        .bind(order.client_party_id.as_uuid())
        .bind(&order.client_display_name)
        .bind(&order.status)
        .bind(&order.order_type)
        .bind(&order.destination)
        .bind(order.date_from)
        .bind(order.date_to)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_line_item(
        &self,
        order_id: OrderId,
        category: ServiceCategory,
        ref_nr: &str,
    ) -> Result<Option<OrderLineItem>> {
        let sql = format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM order_line_items \
             WHERE order_id = $1 AND category = $2 AND ref_nr = $3 LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .bind(category.as_str())
            .bind(ref_nr)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_line_item).transpose()
    }

    async fn insert_line_item(&self, item: OrderLineItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_line_items (id, order_id, company_id, category, ref_nr, service_name,
                                          room, board, supplier_name, currency, client_price,
                                          service_price, date_from, date_to, reservation_status,
                                          created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.company_id.as_uuid())
        .bind(item.category.as_str())
        .bind(&item.ref_nr)
        .bind(&item.service_name)
        .bind(&item.room)
        .bind(&item.board)
        .bind(&item.supplier_name)
        .bind(item.currency.as_str())
        .bind(item.client_price.minor_units())
        .bind(item.service_price.minor_units())
        .bind(item.date_from)
        .bind(item.date_to)
        .bind(&item.reservation_status)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn line_items_by_ref(&self, ref_nr: &str) -> Result<Vec<OrderLineItem>> {
        let sql = format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM order_line_items WHERE ref_nr = $1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(ref_nr)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_line_item).collect()
    }
}

#[async_trait]
impl WebhookReceipts for PostgresStore {
    async fn has_delivery(&self, provider_event_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM webhook_receipts WHERE provider_event_id = $1)",
        )
        .bind(provider_event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn record_delivery(
        &self,
        provider_event_id: &str,
        offer_id: Option<OfferId>,
        received_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_receipts (provider_event_id, offer_id, received_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider_event_id) DO NOTHING
            "#,
        )
        .bind(provider_event_id)
        .bind(offer_id.map(|id| id.as_uuid()))
        .bind(received_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
