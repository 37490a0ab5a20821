use auto_trade_core::{EntryRequest, ExitRequest};

/// Prompt for the entry gate. The answer is requested as a JSON object.
#[must_use]
pub fn entry_prompt(request: &EntryRequest) -> String {
    format!(
        "Trade signal review.\n\
         Instrument: {name} ({id})\n\
         Direction: {direction}\n\
         Quote: bid {bid}, offer {offer}\n\
         Indicators: {indicators}\n\
         Round-trip cost: {cost:.3}%\n\
         Move needed to break even: {break_even:.3}%\n\
         Answer with a JSON object {{\"decision\": \"APPROVE\" or \"REJECT\", \"reason\": \"short reason\"}}.",
        name = request.instrument_name,
        id = request.instrument_id,
        direction = request.direction,
        bid = request.quote.buy,
        offer = request.quote.sell,
        indicators = request.indicators.describe(),
        cost = request.trading_cost * 100.0,
        break_even = request.break_even * 100.0,
    )
}

/// Prompt for the trailing exit check, framed around profit after costs.
#[must_use]
pub fn exit_prompt(request: &ExitRequest) -> String {
    format!(
        "Open position review.\n\
         Instrument: {name} ({id})\n\
         Direction: {direction}\n\
         Open price: {open}\n\
         Current price: {current}\n\
         Indicators: {indicators}\n\
         Net profit after costs: {net:+.3}%\n\
         Round-trip cost: {cost:.3}%\n\
         Answer with a JSON object {{\"action\": \"CLOSE\" or \"HOLD\", \
         \"net_take_profit_pct\": number, \"confidence\": number, \"reason\": \"short reason\"}}.",
        name = request.instrument_name,
        id = request.instrument_id,
        direction = request.direction,
        open = request.open_price,
        current = request.current_price,
        indicators = request.indicators.describe(),
        net = request.net_profit * 100.0,
        cost = request.trading_cost * 100.0,
    )
}
