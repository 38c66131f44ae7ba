//! Small catalogs shared by the unit tests.

use fitment_catalog::{Catalog, ClassDocument, ObjectDocument, props};
use std::sync::Arc;

/// Controllers need one PCIe lane from a backplane; a backplane offers
/// two and at most one backplane may exist per session.
pub(crate) fn controller_catalog(try_new: bool) -> Arc<Catalog> {
    let catalog = Catalog::builder("controllers")
        .class(
            ClassDocument::new("Controller", props::BASE_OBJECT_CLASS).with_object(
                ObjectDocument::new("pcie_controller")
                    .with_value(props::PART_NUMBER, "CTRL-1")
                    .with_list(props::NEEDER_LIST, ["ctrl_pcie_needer"]),
            ),
        )
        .class(
            ClassDocument::new("Backplane", props::BASE_OBJECT_CLASS)
                .with_value(props::MAXIMUM, 1)
                .with_value(props::VALIDATION_ORDER, 5)
                .with_object(
                    ObjectDocument::new("pcie_backplane")
                        .with_list(props::PROVIDER_LIST, ["bp_pcie_slots"]),
                ),
        )
        .class(
            ClassDocument::new("LaneNeeder", props::BASE_NEEDER_CLASS).with_object(
                ObjectDocument::new("ctrl_pcie_needer")
                    .with_value(props::PROTOCOL_TYPE, "PCIe")
                    .with_value(props::TRY_NEW_PROVIDERS, try_new)
                    .with_list(props::PROVIDER_CLASS_ID_LIST, ["Backplane"]),
            ),
        )
        .class(
            ClassDocument::new("LaneProvider", props::BASE_PROVIDER_CLASS).with_object(
                ObjectDocument::new("bp_pcie_slots")
                    .with_value(props::PROTOCOL_TYPE, "PCIe")
                    .with_value(props::QTY_PROVIDED, 2),
            ),
        )
        .class(
            ClassDocument::new("Caps", props::SESSION_MAXIMUM_FILTER_CLASS).with_object(
                ObjectDocument::new("backplane_cap")
                    .with_list(props::APPLICABLE_CLASS_ID_LIST, ["Controller"]),
            ),
        )
        .build()
        .expect("controller catalog should build");
    Arc::new(catalog)
}

/// A server needs power. `psu_a` sorts first but needs a fan nobody can
/// provide; `psu_b` has no needs of its own.
pub(crate) fn power_catalog() -> Arc<Catalog> {
    let catalog = Catalog::builder("power")
        .class(
            ClassDocument::new("Server", props::BASE_OBJECT_CLASS).with_object(
                ObjectDocument::new("server").with_list(props::NEEDER_LIST, ["server_power"]),
            ),
        )
        .class(
            ClassDocument::new("Psu", props::BASE_OBJECT_CLASS)
                .with_object(
                    ObjectDocument::new("psu_a")
                        .with_list(props::NEEDER_LIST, ["psu_a_fan"])
                        .with_list(props::PROVIDER_LIST, ["psu_a_out"]),
                )
                .with_object(
                    ObjectDocument::new("psu_b").with_list(props::PROVIDER_LIST, ["psu_b_out"]),
                ),
        )
        .class(ClassDocument::new("FanTray", props::BASE_OBJECT_CLASS))
        .class(
            ClassDocument::new("Needs", props::BASE_NEEDER_CLASS)
                .with_object(
                    ObjectDocument::new("server_power")
                        .with_value(props::PROTOCOL_TYPE, "Power")
                        .with_list(props::PROVIDER_CLASS_ID_LIST, ["Psu"]),
                )
                .with_object(
                    ObjectDocument::new("psu_a_fan")
                        .with_value(props::PROTOCOL_TYPE, "Fan")
                        .with_value(props::TRY_NEW_PROVIDERS, false)
                        .with_list(props::PROVIDER_CLASS_ID_LIST, ["FanTray"]),
                ),
        )
        .class(
            ClassDocument::new("PowerOut", props::BASE_PROVIDER_CLASS)
                .with_value(props::PROTOCOL_TYPE, "Power")
                .with_value(props::QTY_PROVIDED, 1)
                .with_object(ObjectDocument::new("psu_a_out"))
                .with_object(ObjectDocument::new("psu_b_out")),
        )
        .build()
        .expect("power catalog should build");
    Arc::new(catalog)
}

/// A server needs an `X` lane and then a `Y` lane from a board; the only
/// board offers `X`.
pub(crate) fn board_catalog(try_new_y: bool) -> Arc<Catalog> {
    let catalog = Catalog::builder("boards")
        .class(
            ClassDocument::new("Server", props::BASE_OBJECT_CLASS)
                .with_value(props::VALIDATION_ORDER, 10)
                .with_object(
                    ObjectDocument::new("server").with_list(props::NEEDER_LIST, ["need_y", "need_x"]),
                ),
        )
        .class(
            ClassDocument::new("Board", props::BASE_OBJECT_CLASS).with_object(
                ObjectDocument::new("board_x").with_list(props::PROVIDER_LIST, ["out_x"]),
            ),
        )
        .class(
            ClassDocument::new("Lanes", props::BASE_NEEDER_CLASS)
                .with_list(props::PROVIDER_CLASS_ID_LIST, ["Board"])
                .with_object(
                    ObjectDocument::new("need_x")
                        .with_value(props::PROTOCOL_TYPE, "X")
                        .with_value(props::VALIDATION_ORDER, 1)
                        .with_value(props::TRY_NEW_PROVIDERS, false),
                )
                .with_object(
                    ObjectDocument::new("need_y")
                        .with_value(props::PROTOCOL_TYPE, "Y")
                        .with_value(props::VALIDATION_ORDER, 2)
                        .with_value(props::TRY_NEW_PROVIDERS, try_new_y),
                ),
        )
        .class(
            ClassDocument::new("LaneOut", props::BASE_PROVIDER_CLASS).with_object(
                ObjectDocument::new("out_x")
                    .with_value(props::PROTOCOL_TYPE, "X")
                    .with_value(props::QTY_PROVIDED, 1),
            ),
        )
        .build()
        .expect("board catalog should build");
    Arc::new(catalog)
}
