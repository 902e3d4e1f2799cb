use std::fmt::{self, Write};

use weather_common::{ComfortPredictor, StationState, TelemetrySample};

use crate::{response::Response, server::ServerCounters};

const PAGE_STYLE: &str = r#"<style>
    body{font-family:Arial,sans-serif;max-width:760px;margin:2rem auto;padding:0 1rem;color:#111}
    h1{margin:0 0 .5rem}.card{border:1px solid #ddd;border-radius:10px;padding:1rem;margin-bottom:1rem}
    .big{font-size:2rem;margin:.2rem 0}.muted{color:#555}
    table{width:100%;border-collapse:collapse}td,th{text-align:left;padding:.25rem .4rem;border-bottom:1px solid #eee}
    button{padding:.45rem .8rem;margin:.2rem .2rem 0 0}
    p{margin:.35rem 0}
  </style>"#;

const FEEDBACK_SCRIPT: &str = r#"<script>
    async function rate(rating){
      const status=document.getElementById('feedbackStatus');
      const body={rating,temp:Number(document.body.dataset.temp),humidity:Number(document.body.dataset.humidity)};
      try{
        const r=await fetch('/feedback',{method:'POST',headers:{'content-type':'application/json'},body:JSON.stringify(body)});
        status.textContent=r.ok?'Thanks, the model has been updated.':'Feedback rejected.';
      }catch(err){status.textContent=err.message;}
    }
  </script>"#;

/// Renders the HTML dashboard. Counts as one prediction made by the model.
pub fn render(
    state: &mut StationState,
    snapshot: &TelemetrySample,
    counters: ServerCounters,
) -> Response {
    let comfort = state.predictor.predict(
        f64::from(snapshot.temperature),
        f64::from(snapshot.humidity),
    );
    state.predictor.record_prediction();

    let mut html = String::with_capacity(8 * 1024);
    // Writing into a String cannot fail.
    let _ = write_page(&mut html, state, snapshot, comfort, counters);
    Response::html(html)
}

fn write_page(
    html: &mut String,
    state: &StationState,
    snapshot: &TelemetrySample,
    comfort: f64,
    counters: ServerCounters,
) -> fmt::Result {
    let stats = state.predictor.stats();
    let quality = snapshot.signal_quality();

    write!(
        html,
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <meta http-equiv="refresh" content="30">
  <title>Weather Station</title>
  {PAGE_STYLE}
</head>
<body data-temp="{temp:.1}" data-humidity="{humidity:.1}">
  <h1>Weather Station</h1>
  <p class="muted">Uptime: {uptime}</p>

  <div class="card">
    <h2>Current Reading</h2>
    <p class="big">{temp:.1} &deg;C &middot; {humidity:.1} %</p>
    <p>Wi-Fi signal: {rssi} dBm ({quality})</p>
  </div>
"#,
        temp = snapshot.temperature,
        humidity = snapshot.humidity,
        uptime = format_uptime(state.uptime_ms(snapshot.timestamp_ms)),
        rssi = snapshot.signal_strength,
        quality = quality.as_str(),
    )?;

    write!(
        html,
        r#"
  <div class="card">
    <h2>Comfort Prediction</h2>
    <p class="big">{description}</p>
    <p>Score: {comfort:.2} ({percent:.0}%)</p>
    <p class="muted">Weights: temp {w0:.4}, humidity {w1:.4}, bias {bias:.4} &middot; learning rate {lr}</p>
    <p class="muted">Predictions made: {predictions} &middot; feedback received: {feedback}</p>
    <p>How comfortable does it feel right now?</p>
    <button onclick="rate(0.0)">Awful</button><button onclick="rate(0.25)">Poor</button><button onclick="rate(0.5)">Okay</button><button onclick="rate(0.75)">Nice</button><button onclick="rate(1.0)">Perfect</button>
    <p id="feedbackStatus" class="muted"></p>
  </div>
"#,
        description = ComfortPredictor::describe(comfort),
        percent = comfort * 100.0,
        w0 = stats.temp_weight,
        w1 = stats.humidity_weight,
        bias = stats.bias,
        lr = stats.learning_rate,
        predictions = stats.predictions_made,
        feedback = stats.feedback_count,
    )?;

    write!(
        html,
        r#"
  <div class="card">
    <h2>History (last {count} of {capacity})</h2>
    <table>
      <tr><th>When</th><th>Temperature</th><th>Humidity</th><th>Signal</th></tr>
"#,
        count = state.history.len(),
        capacity = state.history.capacity(),
    )?;

    if state.history.is_empty() {
        html.push_str("      <tr><td colspan=\"4\" class=\"muted\">No history yet</td></tr>\n");
    }
    for sample in state.history.iter_recent_first() {
        writeln!(
            html,
            "      <tr><td>{}</td><td>{:.1} &deg;C</td><td>{:.1} %</td><td>{} dBm</td></tr>",
            format_age(snapshot.timestamp_ms.saturating_sub(sample.timestamp_ms)),
            sample.temperature,
            sample.humidity,
            sample.signal_strength,
        )?;
    }

    write!(
        html,
        r#"    </table>
  </div>

  <p class="muted">Connections: {accepted} accepted, {served} served, {failed} failed, {closed_by_peer} closed by peer</p>
  {FEEDBACK_SCRIPT}
</body>
</html>
"#,
        accepted = counters.accepted,
        served = counters.served,
        failed = counters.failed,
        closed_by_peer = counters.closed_by_peer,
    )
}

fn format_uptime(uptime_ms: u64) -> String {
    let total_secs = uptime_ms / 1_000;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

fn format_age(age_ms: u64) -> String {
    let minutes = age_ms / 60_000;
    match minutes {
        0 => "just now".to_string(),
        1..=59 => format!("{minutes} min ago"),
        _ => format!("{} h {} min ago", minutes / 60, minutes % 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use weather_common::StationConfig;

    fn page(state: &mut StationState, snapshot: &TelemetrySample) -> String {
        let response = render(state, snapshot, ServerCounters::default());
        String::from_utf8(response.body).unwrap()
    }

    #[test]
    fn empty_history_renders_placeholder() {
        let mut state = StationState::new(&StationConfig::default(), 0);
        let html = page(&mut state, &TelemetrySample::new(1_000, 21.4, 44.0, -58));

        assert!(html.contains("No history yet"));
        assert!(html.contains("21.4 &deg;C"));
        assert!(html.contains("-58 dBm (Good)"));
        assert!(html.ends_with("</html>\n"));
    }

    #[test]
    fn history_is_rendered_most_recent_first() {
        let mut state = StationState::new(&StationConfig::default(), 0);
        for (minute, temp) in [(0_u64, 18.0_f32), (1, 19.0), (2, 20.0)] {
            state.record_sample(TelemetrySample::new(minute * 60_000, temp, 40.0, -65));
        }

        let html = page(&mut state, &TelemetrySample::new(3 * 60_000, 20.5, 41.0, -65));

        let newest = html.find("<td>20.0 &deg;C</td>").unwrap();
        let middle = html.find("<td>19.0 &deg;C</td>").unwrap();
        let oldest = html.find("<td>18.0 &deg;C</td>").unwrap();
        assert!(newest < middle && middle < oldest);
        assert!(html.contains("<td>1 min ago</td>"));
        assert!(html.contains("<td>3 min ago</td>"));
        assert!(!html.contains("No history yet"));
    }

    #[test]
    fn full_history_renders_every_row() {
        let mut state = StationState::new(&StationConfig::default(), 0);
        for minute in 0..30 {
            state.record_sample(TelemetrySample::new(minute * 60_000, 20.0, 40.0, -70));
        }

        let html = page(&mut state, &TelemetrySample::new(30 * 60_000, 20.0, 40.0, -70));
        assert_eq!(html.matches("min ago</td>").count(), 24);
        assert!(html.contains("History (last 24 of 24)"));
    }

    #[test]
    fn rendering_records_a_prediction() {
        let mut state = StationState::new(&StationConfig::default(), 0);
        let snapshot = TelemetrySample::new(0, 30.0, 50.0, -45);

        let html = page(&mut state, &snapshot);

        assert_eq!(state.predictor.prediction_count(), 1);
        assert!(html.contains("Moderate"));
        assert!(html.contains("Score: 0.56"));
        assert!(html.contains("(Excellent)"));
    }

    #[test]
    fn renders_every_connection_counter() {
        let mut state = StationState::new(&StationConfig::default(), 0);
        let counters = ServerCounters {
            accepted: 9,
            served: 6,
            failed: 2,
            closed_by_peer: 1,
        };

        let response = render(&mut state, &TelemetrySample::new(0, 20.0, 40.0, -60), counters);
        let html = String::from_utf8(response.body).unwrap();

        assert!(html.contains("Connections: 9 accepted, 6 served, 2 failed, 1 closed by peer"));
    }

    #[test]
    fn uptime_and_age_formatting() {
        assert_eq!(format_uptime(0), "00:00:00");
        assert_eq!(format_uptime(3_723_000), "01:02:03");
        assert_eq!(format_uptime(90_061_000), "1d 01:01:01");
        assert_eq!(format_age(59_999), "just now");
        assert_eq!(format_age(5 * 60_000), "5 min ago");
        assert_eq!(format_age(125 * 60_000), "2 h 5 min ago");
    }
}
