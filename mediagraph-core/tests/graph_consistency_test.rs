use mediagraph::errors::GraphError;
use mediagraph::model::{
    DerivationKind, Edge, GeneratedFrom, InputHandle, Node, NodeStatus, Position,
};
use mediagraph::store::{GraphHandle, NodePatch};

fn ready_image(id: &str, x: f64) -> Node {
    Node::image(id, Position::new(x, 0.0))
        .with_src(format!("https://cdn.example/{}.png", id))
        .with_media_generation_id(format!("m-{}", id))
        .with_status(NodeStatus::Ready)
}

fn ready_video(id: &str) -> Node {
    Node::video(id, Position::new(800.0, 0.0))
        .with_src("https://cdn.example/clip.mp4")
        .with_media_generation_id("m-clip")
        .with_status(NodeStatus::Ready)
        .with_generated_from(
            GeneratedFrom::new(DerivationKind::ImageToVideo)
                .with_sources(["frame"])
                .with_prompt("slow pan"),
        )
}

async fn graph_with_video() -> GraphHandle {
    let graph = GraphHandle::new();
    graph.add_node(ready_image("frame", 0.0)).await.unwrap();
    graph.add_node(ready_image("style", 400.0)).await.unwrap();
    graph.add_node(ready_video("clip")).await.unwrap();
    graph
        .connect("frame", "clip", InputHandle::StartImage)
        .await
        .unwrap();
    graph
        .connect("style", "clip", InputHandle::Reference(1))
        .await
        .unwrap();
    graph
}

#[tokio::test]
async fn test_deleting_start_image_resets_video() {
    let graph = graph_with_video().await;

    graph.delete_node("frame").await.unwrap();

    let clip = graph.node("clip").await.unwrap();
    let video = clip.as_video().unwrap();
    assert_eq!(video.start_image_id, None);
    assert_eq!(video.reference_image_ids[1].as_deref(), Some("style"));
    assert_eq!(clip.status, NodeStatus::Pending);
    assert_eq!(clip.src(), Some(""));
    assert_eq!(clip.media_generation_id(), None);
    assert!(clip.generated_from.unwrap().source_ids.is_empty());

    let edges = graph.edges().await;
    assert!(edges.iter().all(|edge| !edge.touches("frame")));
    assert_eq!(edges.len(), 1);
}

#[tokio::test]
async fn test_replacing_upstream_image_invalidates_video() {
    let graph = graph_with_video().await;

    graph
        .update_node("style", NodePatch::new().src("https://cdn.example/style-v2.png"))
        .await
        .unwrap();

    let clip = graph.node("clip").await.unwrap();
    assert_eq!(clip.status, NodeStatus::Pending);
    assert!(clip.active_job.is_none());
    // Slots survive, only the generated output is dropped
    assert_eq!(clip.as_video().unwrap().start_image_id.as_deref(), Some("frame"));
}

#[tokio::test]
async fn test_connecting_twice_keeps_one_edge() {
    let graph = graph_with_video().await;
    let before = graph.edges().await.len();

    let first = graph
        .connect("frame", "clip", InputHandle::StartImage)
        .await
        .unwrap();
    let second = graph
        .connect("frame", "clip", InputHandle::StartImage)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(graph.edges().await.len(), before);
}

#[tokio::test]
async fn test_rewiring_a_slot_replaces_previous_edge() {
    let graph = graph_with_video().await;

    graph
        .connect("style", "clip", InputHandle::StartImage)
        .await
        .unwrap();

    let edges = graph.edges().await;
    let into_start: Vec<_> = edges
        .iter()
        .filter(|edge| edge.target == "clip" && edge.input_handle() == Some(InputHandle::StartImage))
        .collect();
    assert_eq!(into_start.len(), 1);
    assert_eq!(into_start[0].source, "style");
    assert_eq!(
        graph.node("clip").await.unwrap().as_video().unwrap().start_image_id.as_deref(),
        Some("style")
    );
}

#[tokio::test]
async fn test_incompatible_connection_is_rejected() {
    let graph = graph_with_video().await;
    graph
        .add_node(Node::note("memo", Position::new(0.0, 500.0), "colors"))
        .await
        .unwrap();

    assert!(graph
        .connect("memo", "clip", InputHandle::StartImage)
        .await
        .is_err());
    assert!(graph
        .connect("clip", "frame", InputHandle::Prompt)
        .await
        .is_err());
}

#[tokio::test]
async fn test_removing_frame_edge_resets_video() {
    let graph = graph_with_video().await;
    let edge_id = Edge::derive_id("frame", "clip", Some("start-image"));

    graph.delete_edge(&edge_id).await.unwrap();

    let clip = graph.node("clip").await.unwrap();
    assert_eq!(clip.as_video().unwrap().start_image_id, None);
    assert_eq!(clip.status, NodeStatus::Pending);
    assert_eq!(clip.src(), Some(""));
    assert_eq!(clip.media_generation_id(), None);
    assert_eq!(clip.invariant_violation(), None);
}

#[tokio::test]
async fn test_wiring_new_image_into_used_slot_resets_video() {
    let graph = graph_with_video().await;
    graph.add_node(ready_image("alt", 0.0)).await.unwrap();

    graph
        .connect("alt", "clip", InputHandle::Reference(1))
        .await
        .unwrap();

    let clip = graph.node("clip").await.unwrap();
    assert_eq!(clip.status, NodeStatus::Pending);
    assert_eq!(clip.src(), Some(""));
    assert_eq!(
        clip.as_video().unwrap().reference_image_ids[1].as_deref(),
        Some("alt")
    );
}

#[tokio::test]
async fn test_raw_edge_into_slot_keeps_slot_and_edges_in_step() {
    let graph = GraphHandle::new();
    graph.add_node(ready_image("frame", 0.0)).await.unwrap();
    graph.add_node(ready_video("clip")).await.unwrap();
    graph
        .add_node(Node::note("memo", Position::new(0.0, 500.0), "colors"))
        .await
        .unwrap();

    graph
        .add_or_replace_edge(Edge::into_handle("frame", "clip", InputHandle::EndImage))
        .await
        .unwrap();
    let clip = graph.node("clip").await.unwrap();
    assert_eq!(clip.as_video().unwrap().end_image_id.as_deref(), Some("frame"));

    let err = graph
        .add_or_replace_edge(Edge::into_handle("memo", "clip", InputHandle::StartImage))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidEdge { .. }));

    // Deleting the frame sweeps both the edge and the slot it fills
    graph.delete_node("frame").await.unwrap();
    let clip = graph.node("clip").await.unwrap();
    assert_eq!(clip.as_video().unwrap().end_image_id, None);
    assert!(graph.edges().await.is_empty());
}

#[tokio::test]
async fn test_update_rejects_ready_without_media() {
    let graph = GraphHandle::new();
    graph
        .add_node(Node::image("blank", Position::default()))
        .await
        .unwrap();

    let err = graph
        .update_node("blank", NodePatch::new().status(NodeStatus::Ready))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));
    assert_eq!(graph.node("blank").await.unwrap().status, NodeStatus::Pending);
}
