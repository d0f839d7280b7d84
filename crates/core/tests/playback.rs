use previewer_core::{
    plan, AssetKind, Clip, Line, PlayerConfig, PreloadManifest, PreviewParams, Simulation,
};

fn narrated_preview() -> PreviewParams {
    PreviewParams::new(vec![
        Line::new(
            vec![
                Clip::new("https://cdn.example/intro.mp4", 6.0),
                Clip::new("https://cdn.example/detail.mp4", 2.0),
            ],
            "https://cdn.example/line-0.mp3",
            4.0,
        ),
        Line::new(
            vec![Clip::placeholder(3.0), Clip::new("https://cdn.example/outro.mp4", 3.0)],
            "https://cdn.example/line-1.mp3",
            12.0,
        ),
    ])
}

#[test]
fn preview_url_plays_out_as_planned() {
    let fragment = narrated_preview().to_fragment().unwrap();
    let url = format!("https://preview.example/#{fragment}");
    let params = PreviewParams::from_location(&url).unwrap();
    assert_eq!(params, narrated_preview());

    let config = PlayerConfig::default();
    let timeline = plan(&params, &config).unwrap();
    assert_eq!(timeline.lines[0].rate, 2.0);
    assert_eq!(timeline.lines[1].rate, 0.5);
    assert_eq!(timeline.total_seconds(), 17.0);

    let report = Simulation::new(params, config).unwrap().run().unwrap();
    assert_eq!(report.finish_time, timeline.total_seconds());
    assert!(report.max_plan_deviation < 1e-9);
    assert_eq!(report.lines[1].start, 5.0);
    assert!(report.lines.iter().all(|line| line.drift().abs() < 1e-9));
}

#[test]
fn global_voice_over_preview_preloads_one_narration() {
    let params = narrated_preview().with_global_voice_over("https://cdn.example/vo.mp3");
    let fragment = format!("#{}", params.to_fragment().unwrap());
    let params = PreviewParams::from_location(&fragment).unwrap();

    let manifest = PreloadManifest::build(&params);
    let narration: Vec<_> = manifest
        .entries()
        .iter()
        .filter(|entry| entry.kind != AssetKind::Video)
        .collect();
    assert_eq!(narration.len(), 1);
    assert_eq!(narration[0].url, "https://cdn.example/vo.mp3");

    let report = Simulation::new(params, PlayerConfig::default())
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(report.lines.len(), 2);
}
