//! Parquet export of telemetry for offline analysis.
//!
//! Each writer flattens one telemetry surface into a single record batch.
//! Entities are exported as their `to_bits()` encoding; status enums as
//! small integer codes kept stable for downstream notebooks.

use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, UInt64Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::fleet::VehicleStatus;
use crate::orders::OrderStatus;
use crate::telemetry::{OrderSnapshot, SimSnapshots, SimTelemetry};

pub fn write_completed_orders_parquet<P: AsRef<Path>>(
    path: P,
    telemetry: &SimTelemetry,
) -> Result<(), Box<dyn Error>> {
    let n = telemetry.completed_orders.len();
    let mut order_ids = Vec::with_capacity(n);
    let mut vehicle_entities = Vec::with_capacity(n);
    let mut created_at = Vec::with_capacity(n);
    let mut assigned_at = Vec::with_capacity(n);
    let mut pickup_at = Vec::with_capacity(n);
    let mut completed_at = Vec::with_capacity(n);
    let mut distance_m = Vec::with_capacity(n);
    let mut final_price = Vec::with_capacity(n);

    for record in &telemetry.completed_orders {
        order_ids.push(record.order_id.0);
        vehicle_entities.push(record.vehicle_entity.to_bits());
        created_at.push(record.created_at);
        assigned_at.push(record.assigned_at);
        pickup_at.push(record.pickup_at);
        completed_at.push(record.completed_at);
        distance_m.push(record.distance_m);
        final_price.push(record.final_price);
    }

    let schema = Schema::new(vec![
        Field::new("order_id", DataType::UInt64, false),
        Field::new("vehicle_entity", DataType::UInt64, false),
        Field::new("created_at", DataType::UInt64, false),
        Field::new("assigned_at", DataType::UInt64, false),
        Field::new("pickup_at", DataType::UInt64, false),
        Field::new("completed_at", DataType::UInt64, false),
        Field::new("distance_m", DataType::Float64, false),
        Field::new("final_price", DataType::Float64, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(order_ids)),
        Arc::new(UInt64Array::from(vehicle_entities)),
        Arc::new(UInt64Array::from(created_at)),
        Arc::new(UInt64Array::from(assigned_at)),
        Arc::new(UInt64Array::from(pickup_at)),
        Arc::new(UInt64Array::from(completed_at)),
        Arc::new(Float64Array::from(distance_m)),
        Arc::new(Float64Array::from(final_price)),
    ];

    write_record_batch(path, schema, arrays)
}

pub fn write_snapshot_counts_parquet<P: AsRef<Path>>(
    path: P,
    snapshots: &SimSnapshots,
) -> Result<(), Box<dyn Error>> {
    let n = snapshots.snapshots.len();
    let mut timestamp_ms = Vec::with_capacity(n);
    let mut vehicles_idle = Vec::with_capacity(n);
    let mut vehicles_to_pickup = Vec::with_capacity(n);
    let mut vehicles_with_passenger = Vec::with_capacity(n);
    let mut vehicles_to_charging = Vec::with_capacity(n);
    let mut vehicles_charging = Vec::with_capacity(n);
    let mut orders_pending = Vec::with_capacity(n);
    let mut orders_assigned = Vec::with_capacity(n);
    let mut orders_picked_up = Vec::with_capacity(n);
    let mut orders_completed = Vec::with_capacity(n);
    let mut orders_cancelled = Vec::with_capacity(n);
    let mut occupied_slots = Vec::with_capacity(n);
    let mut total_slots = Vec::with_capacity(n);

    for snapshot in &snapshots.snapshots {
        timestamp_ms.push(snapshot.timestamp_ms);
        vehicles_idle.push(snapshot.counts.vehicles_idle as u64);
        vehicles_to_pickup.push(snapshot.counts.vehicles_to_pickup as u64);
        vehicles_with_passenger.push(snapshot.counts.vehicles_with_passenger as u64);
        vehicles_to_charging.push(snapshot.counts.vehicles_to_charging as u64);
        vehicles_charging.push(snapshot.counts.vehicles_charging as u64);
        orders_pending.push(snapshot.counts.orders_pending as u64);
        orders_assigned.push(snapshot.counts.orders_assigned as u64);
        orders_picked_up.push(snapshot.counts.orders_picked_up as u64);
        orders_completed.push(snapshot.counts.orders_completed as u64);
        orders_cancelled.push(snapshot.counts.orders_cancelled as u64);
        occupied_slots.push(snapshot.counts.occupied_slots as u64);
        total_slots.push(snapshot.counts.total_slots as u64);
    }

    let schema = Schema::new(vec![
        Field::new("timestamp_ms", DataType::UInt64, false),
        Field::new("vehicles_idle", DataType::UInt64, false),
        Field::new("vehicles_to_pickup", DataType::UInt64, false),
        Field::new("vehicles_with_passenger", DataType::UInt64, false),
        Field::new("vehicles_to_charging", DataType::UInt64, false),
        Field::new("vehicles_charging", DataType::UInt64, false),
        Field::new("orders_pending", DataType::UInt64, false),
        Field::new("orders_assigned", DataType::UInt64, false),
        Field::new("orders_picked_up", DataType::UInt64, false),
        Field::new("orders_completed", DataType::UInt64, false),
        Field::new("orders_cancelled", DataType::UInt64, false),
        Field::new("occupied_slots", DataType::UInt64, false),
        Field::new("total_slots", DataType::UInt64, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(timestamp_ms)),
        Arc::new(UInt64Array::from(vehicles_idle)),
        Arc::new(UInt64Array::from(vehicles_to_pickup)),
        Arc::new(UInt64Array::from(vehicles_with_passenger)),
        Arc::new(UInt64Array::from(vehicles_to_charging)),
        Arc::new(UInt64Array::from(vehicles_charging)),
        Arc::new(UInt64Array::from(orders_pending)),
        Arc::new(UInt64Array::from(orders_assigned)),
        Arc::new(UInt64Array::from(orders_picked_up)),
        Arc::new(UInt64Array::from(orders_completed)),
        Arc::new(UInt64Array::from(orders_cancelled)),
        Arc::new(UInt64Array::from(occupied_slots)),
        Arc::new(UInt64Array::from(total_slots)),
    ];

    write_record_batch(path, schema, arrays)
}

/// One row per vehicle per snapshot: position, status and battery over time.
pub fn write_vehicle_traces_parquet<P: AsRef<Path>>(
    path: P,
    snapshots: &SimSnapshots,
) -> Result<(), Box<dyn Error>> {
    let mut timestamp_ms = Vec::new();
    let mut entity = Vec::new();
    let mut vehicle_id = Vec::new();
    let mut status = Vec::new();
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut battery_pct = Vec::new();

    for snapshot in &snapshots.snapshots {
        for vehicle in &snapshot.vehicles {
            timestamp_ms.push(snapshot.timestamp_ms);
            entity.push(vehicle.entity.to_bits());
            vehicle_id.push(vehicle.vehicle_id as u64);
            status.push(vehicle_status_code(vehicle.status));
            x.push(vehicle.position.x);
            y.push(vehicle.position.y);
            battery_pct.push(vehicle.battery_pct);
        }
    }

    let schema = Schema::new(vec![
        Field::new("timestamp_ms", DataType::UInt64, false),
        Field::new("entity", DataType::UInt64, false),
        Field::new("vehicle_id", DataType::UInt64, false),
        Field::new("status", DataType::UInt8, false),
        Field::new("x", DataType::Float64, false),
        Field::new("y", DataType::Float64, false),
        Field::new("battery_pct", DataType::Float64, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(timestamp_ms)),
        Arc::new(UInt64Array::from(entity)),
        Arc::new(UInt64Array::from(vehicle_id)),
        Arc::new(UInt8Array::from(status)),
        Arc::new(Float64Array::from(x)),
        Arc::new(Float64Array::from(y)),
        Arc::new(Float64Array::from(battery_pct)),
    ];

    write_record_batch(path, schema, arrays)
}

/// Latest known state of every order seen across the snapshot buffer.
pub fn write_orders_parquet<P: AsRef<Path>>(
    path: P,
    snapshots: &SimSnapshots,
) -> Result<(), Box<dyn Error>> {
    use std::collections::BTreeMap;
    let mut latest: BTreeMap<u64, (u64, OrderSnapshot)> = BTreeMap::new();

    for snapshot in &snapshots.snapshots {
        for order in &snapshot.orders {
            latest
                .entry(order.id.0)
                .and_modify(|(ts, stored)| {
                    if snapshot.timestamp_ms >= *ts {
                        *ts = snapshot.timestamp_ms;
                        *stored = order.clone();
                    }
                })
                .or_insert_with(|| (snapshot.timestamp_ms, order.clone()));
        }
    }

    let n = latest.len();
    let mut order_ids = Vec::with_capacity(n);
    let mut status = Vec::with_capacity(n);
    let mut pickup_node = Vec::with_capacity(n);
    let mut dropoff_node = Vec::with_capacity(n);
    let mut created_at = Vec::with_capacity(n);
    let mut assigned_at = Vec::with_capacity(n);
    let mut pickup_at = Vec::with_capacity(n);
    let mut completed_at = Vec::with_capacity(n);
    let mut cancelled_at = Vec::with_capacity(n);
    let mut distance_m = Vec::with_capacity(n);
    let mut final_price = Vec::with_capacity(n);

    for (_, (_, order)) in &latest {
        order_ids.push(order.id.0);
        status.push(order_status_code(order.status));
        pickup_node.push(order.pickup_node.0);
        dropoff_node.push(order.dropoff_node.0);
        created_at.push(order.created_at);
        assigned_at.push(order.assigned_at);
        pickup_at.push(order.pickup_at);
        completed_at.push(order.completed_at);
        cancelled_at.push(order.cancelled_at);
        distance_m.push(order.distance_m);
        final_price.push(order.final_price);
    }

    let schema = Schema::new(vec![
        Field::new("order_id", DataType::UInt64, false),
        Field::new("status", DataType::UInt8, false),
        Field::new("pickup_node", DataType::UInt64, false),
        Field::new("dropoff_node", DataType::UInt64, false),
        Field::new("created_at", DataType::UInt64, false),
        Field::new("assigned_at", DataType::UInt64, true),
        Field::new("pickup_at", DataType::UInt64, true),
        Field::new("completed_at", DataType::UInt64, true),
        Field::new("cancelled_at", DataType::UInt64, true),
        Field::new("distance_m", DataType::Float64, false),
        Field::new("final_price", DataType::Float64, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(order_ids)),
        Arc::new(UInt8Array::from(status)),
        Arc::new(UInt64Array::from(pickup_node)),
        Arc::new(UInt64Array::from(dropoff_node)),
        Arc::new(UInt64Array::from(created_at)),
        Arc::new(UInt64Array::from(assigned_at)),
        Arc::new(UInt64Array::from(pickup_at)),
        Arc::new(UInt64Array::from(completed_at)),
        Arc::new(UInt64Array::from(cancelled_at)),
        Arc::new(Float64Array::from(distance_m)),
        Arc::new(Float64Array::from(final_price)),
    ];

    write_record_batch(path, schema, arrays)
}

/// Checks that an order's timestamps are consistent with its status: each
/// lifecycle stage sets exactly the fields its status implies, in
/// non-decreasing order. Returns a description of the first violation, or
/// `None` when clean.
pub fn validate_order_timestamp_ordering(order: &OrderSnapshot) -> Option<String> {
    // (field, value, required) per status. Fields not listed must be unset.
    let expectations: Vec<(&str, Option<u64>, bool)> = match order.status {
        OrderStatus::Pending => vec![],
        OrderStatus::Assigned => vec![("assigned_at", order.assigned_at, true)],
        OrderStatus::PickedUp => vec![
            ("assigned_at", order.assigned_at, true),
            ("pickup_at", order.pickup_at, true),
        ],
        OrderStatus::Completed => vec![
            ("assigned_at", order.assigned_at, true),
            ("pickup_at", order.pickup_at, true),
            ("completed_at", order.completed_at, true),
        ],
        OrderStatus::Cancelled => vec![("cancelled_at", order.cancelled_at, true)],
    };

    let all_fields: [(&str, Option<u64>); 4] = [
        ("assigned_at", order.assigned_at),
        ("pickup_at", order.pickup_at),
        ("completed_at", order.completed_at),
        ("cancelled_at", order.cancelled_at),
    ];
    for (name, value) in all_fields {
        let expected = expectations.iter().any(|(n, _, _)| *n == name);
        if value.is_some() && !expected {
            return Some(format!(
                "order {:?} ({:?}): unexpected {name}",
                order.id, order.status
            ));
        }
    }

    let mut previous = ("created_at", order.created_at);
    for (name, value, required) in expectations {
        let Some(at) = value else {
            if required {
                return Some(format!(
                    "order {:?} ({:?}): missing {name}",
                    order.id, order.status
                ));
            }
            continue;
        };
        if at < previous.1 {
            return Some(format!(
                "order {:?}: {name} ({at}) precedes {} ({})",
                order.id, previous.0, previous.1
            ));
        }
        previous = (name, at);
    }

    None
}

fn write_record_batch<P: AsRef<Path>>(
    path: P,
    schema: Schema,
    arrays: Vec<ArrayRef>,
) -> Result<(), Box<dyn Error>> {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn vehicle_status_code(status: VehicleStatus) -> u8 {
    match status {
        VehicleStatus::Idle => 0,
        VehicleStatus::ToPickup => 1,
        VehicleStatus::WithPassenger => 2,
        VehicleStatus::ToCharging => 3,
        VehicleStatus::Charging => 4,
    }
}

fn order_status_code(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Assigned => 1,
        OrderStatus::PickedUp => 2,
        OrderStatus::Completed => 3,
        OrderStatus::Cancelled => 4,
    }
}
