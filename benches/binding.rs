//! Benchmarks for the binding pipeline.
//!
//! - Linearization of annotated class hierarchies
//! - Binding `hbm.xml` documents end to end
//! - Binding documents deferred on `extends`

extern crate ormbind;

use criterion::{criterion_group, criterion_main, Criterion};
use ormbind::{
    metadata::{
        queue::order_and_fill_hierarchy,
        typesystem::{ClassAnnotation, ClassDescriptor, ClassDescriptorRc, ClassRegistry},
    },
    prelude::*,
};
use std::hint::black_box;

/// A chain of `depth` entities, each extending the previous one, registered leaf first.
fn class_chain(depth: usize) -> (ClassRegistry, Vec<ClassDescriptorRc>) {
    let registry = ClassRegistry::new();
    let mut classes = Vec::with_capacity(depth);
    for index in (0..depth).rev() {
        let mut class = ClassDescriptor::new(format!("bench.C{index}"))
            .annotated(ClassAnnotation::Entity { name: None });
        if index > 0 {
            class = class.extends(format!("bench.C{}", index - 1));
        }
        classes.push(registry.register(class));
    }
    (registry, classes)
}

fn bench_linearize_hierarchy(c: &mut Criterion) {
    let (registry, classes) = class_chain(32);

    c.bench_function("linearize_hierarchy_32", |b| {
        b.iter(|| {
            let ordered = order_and_fill_hierarchy(black_box(&classes), &registry, 64).unwrap();
            black_box(ordered)
        });
    });
}

fn entity_document(index: usize) -> String {
    format!(
        r#"<hibernate-mapping package="bench">
            <class name="Order{index}" table="ORDERS_{index}">
                <id name="id" type="long"><generator class="native"/></id>
                <property name="placed" type="timestamp"/>
                <property name="total" type="big_decimal"/>
                <list name="lines">
                    <key column="ORDER_ID" not-null="true"/>
                    <list-index column="POS"/>
                    <one-to-many class="Line{index}"/>
                </list>
                <set name="tags" table="ORDER_TAGS_{index}">
                    <key column="ORDER_ID"/>
                    <element column="TAG" type="string"/>
                </set>
            </class>
            <class name="Line{index}" table="LINES_{index}">
                <id name="id" type="long"/>
                <property name="quantity" type="integer"/>
            </class>
        </hibernate-mapping>"#
    )
}

fn bench_bind_documents(c: &mut Criterion) {
    let documents: Vec<String> = (0..50).map(entity_document).collect();

    c.bench_function("bind_50_documents", |b| {
        b.iter(|| {
            let mut sources = MetadataSources::new();
            for (index, xml) in documents.iter().enumerate() {
                sources
                    .add_hbm_xml_str(xml, &format!("order{index}.hbm.xml"))
                    .unwrap();
            }
            black_box(sources.build_metadata().unwrap())
        });
    });
}

fn bench_extends_resolution(c: &mut Criterion) {
    let mut documents: Vec<String> = (1..20)
        .rev()
        .map(|index| {
            format!(
                r#"<hibernate-mapping package="bench">
                    <subclass name="S{index}" extends="S{}" discriminator-value="{index}"/>
                </hibernate-mapping>"#,
                index - 1
            )
        })
        .collect();
    documents.push(
        r#"<hibernate-mapping package="bench">
            <class name="S0" discriminator-value="0"><id name="id" type="long"/>
                <discriminator column="KIND" type="string"/>
            </class>
        </hibernate-mapping>"#
            .to_string(),
    );

    c.bench_function("resolve_extends_chain_20", |b| {
        b.iter(|| {
            let mut sources = MetadataSources::new();
            for (index, xml) in documents.iter().enumerate() {
                sources
                    .add_hbm_xml_str(xml, &format!("s{index}.hbm.xml"))
                    .unwrap();
            }
            black_box(sources.build_metadata().unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_linearize_hierarchy,
    bench_bind_documents,
    bench_extends_resolution
);
criterion_main!(benches);
